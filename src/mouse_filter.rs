use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::types::Seconds;

/// Parámetros del filtro paso-bajo adaptativo del cursor
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorFilterConfig {
    /// Corte mínimo en Hz; más bajo = más suave en reposo (default: 1.0)
    pub min_cutoff: f32,
    /// Cuánto sube el corte por px/s de velocidad estimada (default: 0.007)
    pub speed_coefficient: f32,
    /// Corte fijo del paso-bajo de la derivada, en Hz (default: 1.0)
    pub derivative_cutoff: f32,
}

impl Default for CursorFilterConfig {
    fn default() -> Self {
        Self {
            min_cutoff: 1.0,
            speed_coefficient: 0.007,
            derivative_cutoff: 1.0,
        }
    }
}

impl CursorFilterConfig {
    pub fn is_valid(&self) -> bool {
        self.min_cutoff.is_finite()
            && self.min_cutoff > 0.0
            && self.derivative_cutoff.is_finite()
            && self.derivative_cutoff > 0.0
            && self.speed_coefficient.is_finite()
            && self.speed_coefficient >= 0.0
    }
}

/// Estado de un canal escalar. Sin estado = próxima muestra es la primera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterState {
    pub value: f32,
    pub derivative: f32,
    pub timestamp: Seconds,
}

/// α = 1 / (1 + τ/dt) con τ = 1/(2π·corte)
fn smoothing_factor(dt: f32, cutoff: f32) -> f32 {
    let tau = 1.0 / (2.0 * PI * cutoff);
    1.0 / (1.0 + tau / dt)
}

/// Filtro adaptativo de un solo eje
#[derive(Clone, Debug)]
pub struct CursorFilter {
    config: CursorFilterConfig,
    state: Option<FilterState>,
}

impl CursorFilter {
    pub fn new(config: CursorFilterConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    pub fn state(&self) -> Option<&FilterState> {
        self.state.as_ref()
    }

    /// Una muestra no finita nunca entra en el estado: devuelve el último
    /// valor filtrado (o la propia muestra si aún no hay historia)
    pub fn filter(&mut self, raw: f32, timestamp: Seconds) -> f32 {
        if !raw.is_finite() {
            return self.state.map_or(raw, |prev| prev.value);
        }
        let Some(prev) = self.state else {
            self.state = Some(FilterState {
                value: raw,
                derivative: 0.0,
                timestamp,
            });
            return raw;
        };

        let dt = (timestamp - prev.timestamp) as f32;
        if dt <= 0.0 || !dt.is_finite() {
            return prev.value;
        }

        // 1. derivativa contra el último valor filtrado, suavizada con corte fijo
        let raw_derivative = (raw - prev.value) / dt;
        let a_d = smoothing_factor(dt, self.config.derivative_cutoff);
        let derivative = a_d * raw_derivative + (1.0 - a_d) * prev.derivative;

        // 2. corte adaptativo: sube con la velocidad
        let cutoff = self.config.min_cutoff + self.config.speed_coefficient * derivative.abs();
        let a = smoothing_factor(dt, cutoff);

        // 3. paso-bajo sobre el valor
        let value = a * raw + (1.0 - a) * prev.value;

        self.state = Some(FilterState {
            value,
            derivative,
            timestamp,
        });
        value
    }

    /// Olvida valor, derivada y timestamp a la vez
    pub fn reset(&mut self) {
        self.state = None;
    }
}

/// Un filtro independiente por eje del cursor
#[derive(Clone, Debug)]
pub struct CursorFilter2D {
    pub x: CursorFilter,
    pub y: CursorFilter,
}

impl CursorFilter2D {
    pub fn new(config: CursorFilterConfig) -> Self {
        Self {
            x: CursorFilter::new(config),
            y: CursorFilter::new(config),
        }
    }

    pub fn filter(&mut self, pos: (f32, f32), timestamp: Seconds) -> (f32, f32) {
        (self.x.filter(pos.0, timestamp), self.y.filter(pos.1, timestamp))
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }

    pub fn is_primed(&self) -> bool {
        self.x.state().is_some() && self.y.state().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const DT: f64 = 1.0 / 32.0;

    fn config(speed_coefficient: f32) -> CursorFilterConfig {
        CursorFilterConfig {
            min_cutoff: 1.0,
            speed_coefficient,
            derivative_cutoff: 1.0,
        }
    }

    #[test]
    fn first_sample_passes_through() {
        let mut f = CursorFilter::new(CursorFilterConfig::default());
        assert_eq!(f.filter(123.5, 10.0), 123.5);
        let state = f.state().unwrap();
        assert_eq!(state.derivative, 0.0);
        assert_eq!(state.timestamp, 10.0);
    }

    #[test]
    fn constant_input_has_no_bias() {
        let mut f = CursorFilter::new(CursorFilterConfig::default());
        for k in 0..5 {
            let out = f.filter(640.0, k as f64 * DT);
            assert!((out - 640.0).abs() < 1e-3, "out = {out}");
        }
    }

    #[test]
    fn converges_after_step() {
        let mut f = CursorFilter::new(CursorFilterConfig::default());
        f.filter(0.0, 0.0);
        let mut out = 0.0;
        for k in 1..=400 {
            out = f.filter(800.0, k as f64 * DT);
        }
        assert!((out - 800.0).abs() < 0.01, "out = {out}");
    }

    #[test]
    fn non_increasing_timestamp_returns_last_value() {
        let mut f = CursorFilter::new(CursorFilterConfig::default());
        f.filter(0.0, 1.0);
        let v = f.filter(100.0, 1.0 + DT);
        assert_eq!(f.filter(900.0, 1.0 + DT), v);
        assert_eq!(f.filter(900.0, 0.5), v);
    }

    #[test]
    fn non_finite_sample_keeps_state() {
        let mut f = CursorFilter::new(CursorFilterConfig::default());
        assert!(f.filter(f32::NAN, 0.0).is_nan());
        assert!(f.state().is_none());

        f.filter(100.0, 0.0);
        let v = f.filter(120.0, DT);
        let before = *f.state().unwrap();
        assert_eq!(f.filter(f32::NAN, 2.0 * DT), v);
        assert_eq!(f.filter(f32::INFINITY, 2.0 * DT), v);
        assert_eq!(*f.state().unwrap(), before);

        let next = f.filter(120.0, 2.0 * DT);
        assert!(next.is_finite() && next > 100.0);
    }

    #[test]
    fn adaptive_cutoff_reduces_lag_on_fast_motion() {
        let mut adaptive = CursorFilter::new(config(0.05));
        let mut fixed = CursorFilter::new(config(0.0));
        let speed = 1500.0_f32;
        let (mut lag_adaptive, mut lag_fixed) = (0.0, 0.0);
        for k in 0..64 {
            let t = k as f64 * DT;
            let raw = speed * t as f32;
            lag_adaptive = raw - adaptive.filter(raw, t);
            lag_fixed = raw - fixed.filter(raw, t);
        }
        assert!(lag_adaptive > 0.0);
        assert!(lag_adaptive < lag_fixed, "{lag_adaptive} vs {lag_fixed}");
    }

    #[test]
    fn reset_drops_accumulated_velocity() {
        let mut f = CursorFilter::new(config(0.05));
        for k in 0..32 {
            f.filter(2000.0 * k as f32 * DT as f32, k as f64 * DT);
        }
        assert!(f.state().unwrap().derivative.abs() > 100.0);

        f.reset();
        assert!(f.state().is_none());
        assert_eq!(f.filter(300.0, 32.0 * DT), 300.0);
        // sin inercia heredada: una muestra quieta no se pasa de largo
        let next = f.filter(300.0, 33.0 * DT);
        assert!((next - 300.0).abs() < 1e-3, "next = {next}");
    }

    #[test]
    fn smooths_jitter_around_rest() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut f = CursorFilter2D::new(CursorFilterConfig::default());
        let (mut raw_err, mut out_err) = (0.0_f32, 0.0_f32);
        for k in 0..256 {
            let raw = (
                500.0 + rng.gen_range(-6.0..6.0),
                300.0 + rng.gen_range(-6.0..6.0),
            );
            let out = f.filter(raw, k as f64 * DT);
            if k >= 16 {
                raw_err += (raw.0 - 500.0).powi(2) + (raw.1 - 300.0).powi(2);
                out_err += (out.0 - 500.0).powi(2) + (out.1 - 300.0).powi(2);
            }
        }
        assert!(out_err < raw_err * 0.25, "{out_err} vs {raw_err}");
    }

    #[test]
    fn axes_are_independent() {
        let mut f = CursorFilter2D::new(CursorFilterConfig::default());
        assert!(!f.is_primed());
        f.filter((10.0, 20.0), 0.0);
        assert!(f.is_primed());
        let (x, y) = f.filter((10.0, 200.0), DT);
        assert_eq!(x, 10.0);
        assert!(y > 20.0 && y < 200.0);
        f.reset();
        assert!(!f.is_primed());
    }

    #[test]
    fn rejects_non_positive_cutoffs() {
        assert!(CursorFilterConfig::default().is_valid());
        assert!(!CursorFilterConfig {
            min_cutoff: 0.0,
            ..Default::default()
        }
        .is_valid());
        assert!(!config(-1.0).is_valid());
    }
}
