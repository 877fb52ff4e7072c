use serde::{Deserialize, Serialize};

use crate::types::Landmark;

/// Sub-rectángulo de la cámara que se estira sobre toda la pantalla
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveRegion {
    /// Margen horizontal como fracción del ancho de imagen, en [0, 0.5) (default: 0.15)
    pub padding_x: f32,
    /// Margen vertical como fracción del alto de imagen, en [0, 0.5) (default: 0.15)
    pub padding_y: f32,
    /// Espejo horizontal para interacción de frente a la cámara (default: true)
    pub mirror_x: bool,
}

impl Default for ActiveRegion {
    fn default() -> Self {
        Self {
            padding_x: 0.15,
            padding_y: 0.15,
            mirror_x: true,
        }
    }
}

impl ActiveRegion {
    pub fn is_valid(&self) -> bool {
        [self.padding_x, self.padding_y]
            .iter()
            .all(|p| p.is_finite() && (0.0..0.5).contains(p))
    }
}

/// Resolución de salida en píxeles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputResolution {
    pub width: u32,
    pub height: u32,
}

impl Default for OutputResolution {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Mapeo puro cámara → pantalla
#[derive(Debug, Clone, Copy)]
pub struct CoordinateMapper {
    region: ActiveRegion,
    output: OutputResolution,
}

impl CoordinateMapper {
    pub fn new(region: ActiveRegion, output: OutputResolution) -> Self {
        Self { region, output }
    }

    pub fn region(&self) -> &ActiveRegion {
        &self.region
    }

    pub fn output(&self) -> &OutputResolution {
        &self.output
    }

    /// Posición de pantalla para un punto normalizado; None si no es finito.
    /// Fuera de la región se satura al borde más cercano.
    pub fn map(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let mut fx = fraction(x, self.region.padding_x);
        let fy = fraction(y, self.region.padding_y);
        if self.region.mirror_x {
            fx = 1.0 - fx;
        }
        // el último píxel direccionable es width - 1
        let max_x = self.output.width.saturating_sub(1) as f32;
        let max_y = self.output.height.saturating_sub(1) as f32;
        Some((fx * max_x, fy * max_y))
    }

    pub fn map_landmark(&self, p: Landmark) -> Option<(f32, f32)> {
        self.map(p.x, p.y)
    }
}

fn fraction(value: f32, padding: f32) -> f32 {
    let span = 1.0 - 2.0 * padding;
    ((value - padding) / span).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(mirror_x: bool) -> CoordinateMapper {
        CoordinateMapper::new(
            ActiveRegion {
                padding_x: 0.25,
                padding_y: 0.25,
                mirror_x,
            },
            OutputResolution {
                width: 1001,
                height: 501,
            },
        )
    }

    #[test]
    fn inner_edges_map_to_output_edges() {
        let m = mapper(false);
        assert_eq!(m.map(0.25, 0.25), Some((0.0, 0.0)));
        assert_eq!(m.map(0.75, 0.75), Some((1000.0, 500.0)));
        assert_eq!(m.map(0.5, 0.5), Some((500.0, 250.0)));
    }

    #[test]
    fn outside_region_clamps_to_edge() {
        let m = mapper(false);
        assert_eq!(m.map(0.0, -3.0), Some((0.0, 0.0)));
        assert_eq!(m.map(0.9, 1.7), Some((1000.0, 500.0)));
        assert_eq!(m.map(0.1, 0.5), m.map(0.25, 0.5));
    }

    #[test]
    fn mirror_flips_horizontal_only() {
        let m = mapper(true);
        assert_eq!(m.map(0.25, 0.25), Some((1000.0, 0.0)));
        assert_eq!(m.map(0.75, 0.75), Some((0.0, 500.0)));
        assert_eq!(m.map(-1.0, 0.5), Some((1000.0, 250.0)));
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let m = mapper(true);
        assert_eq!(m.map(f32::NAN, 0.5), None);
        assert_eq!(m.map(0.5, f32::INFINITY), None);
    }

    #[test]
    fn padding_validation() {
        assert!(ActiveRegion::default().is_valid());
        let zero = ActiveRegion {
            padding_x: 0.0,
            padding_y: 0.0,
            mirror_x: false,
        };
        assert!(zero.is_valid());
        let half = ActiveRegion {
            padding_x: 0.5,
            ..zero
        };
        assert!(!half.is_valid());
        let negative = ActiveRegion {
            padding_y: -0.1,
            ..zero
        };
        assert!(!negative.is_valid());
    }
}
