use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::{
    Finger, HandFrame, Handedness, INDEX_MCP, INDEX_TIP, MIDDLE_MCP, NUM_FINGERS, NUM_LANDMARKS,
    PINKY_MCP, THUMB_MCP, THUMB_TIP, WRIST,
};

/// Parámetros del extractor de estado de dedos
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Confianza global mínima del detector (default: 0.5)
    pub min_confidence: f32,
    /// Confianza mínima por landmark, si el detector la reporta (default: 0.0)
    pub min_landmark_confidence: f32,
    /// dist(punta, muñeca) debe superar dist(PIP, muñeca) por este factor (default: 1.0)
    pub finger_extension_ratio: f32,
    /// dist(punta pulgar, MCP meñique) contra dist(IP pulgar, MCP meñique) (default: 1.0)
    pub thumb_extension_ratio: f32,
    /// Tamaño de palma mínimo (muñeca→MCP medio) en coordenadas normalizadas (default: 0.01)
    pub min_palm_size: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            min_landmark_confidence: 0.0,
            finger_extension_ratio: 1.0,
            thumb_extension_ratio: 1.0,
            min_palm_size: 0.01,
        }
    }
}

/// Vector de estado de la mano: extensión booleana + rasgos geométricos continuos
#[derive(Debug, Clone, PartialEq)]
pub struct FingerStateVector {
    /// [pulgar, índice, medio, anular, meñique]
    pub extended: [bool; NUM_FINGERS],
    /// Distancias entre puntas normalizadas por el tamaño de palma (simétrica)
    pub tip_distances: [[f32; NUM_FINGERS]; NUM_FINGERS],
    /// Ángulo entre el eje del pulgar y el del índice, en grados
    pub thumb_index_angle: f32,
    /// Normal unitaria de la palma (orientada según la lateralidad)
    pub palm_normal: [f32; 3],
    pub palm_size: f32,
}

impl FingerStateVector {
    pub fn is_extended(&self, finger: Finger) -> bool {
        self.extended[finger.index()]
    }

    pub fn tip_distance(&self, a: Finger, b: Finger) -> f32 {
        self.tip_distances[a.index()][b.index()]
    }

    /// Representación compacta tipo "TTFFF"
    pub fn pattern_string(&self) -> String {
        self.extended
            .iter()
            .map(|&e| if e { 'T' } else { 'F' })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndeterminateReason {
    LowConfidence { confidence: f32, floor: f32 },
    MissingLandmark(usize),
    InvalidGeometry,
}

/// Resultado de la extracción: nunca es un error, un frame malo es un valor más
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Ready(FingerStateVector),
    Indeterminate(IndeterminateReason),
}

impl Extraction {
    pub fn ready(&self) -> Option<&FingerStateVector> {
        match self {
            Extraction::Ready(v) => Some(v),
            Extraction::Indeterminate(_) => None,
        }
    }
}

pub struct FeatureExtractor {
    config: ExtractorConfig,
}

impl FeatureExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Deriva el vector de estado de una mano. Sin efectos laterales.
    pub fn extract(&self, hand: &HandFrame) -> Extraction {
        if !(hand.confidence >= self.config.min_confidence) {
            return Extraction::Indeterminate(IndeterminateReason::LowConfidence {
                confidence: hand.confidence,
                floor: self.config.min_confidence,
            });
        }

        for idx in 0..NUM_LANDMARKS {
            if !hand.landmark(idx).is_finite() {
                return Extraction::Indeterminate(IndeterminateReason::InvalidGeometry);
            }
            if hand.landmark_confidence(idx) < self.config.min_landmark_confidence {
                return Extraction::Indeterminate(IndeterminateReason::MissingLandmark(idx));
            }
        }

        let wrist = hand.landmark(WRIST);
        let palm_size = wrist.distance(hand.landmark(MIDDLE_MCP));
        if !(palm_size >= self.config.min_palm_size) {
            return Extraction::Indeterminate(IndeterminateReason::InvalidGeometry);
        }

        let mut extended = [false; NUM_FINGERS];
        extended[Finger::Thumb.index()] = self.thumb_extended(hand);
        for finger in &Finger::ALL[1..] {
            let tip = hand.landmark(finger.tip()).distance(wrist);
            let pip = hand.landmark(finger.pip()).distance(wrist);
            extended[finger.index()] = tip > pip * self.config.finger_extension_ratio;
        }

        let mut tip_distances = [[0.0f32; NUM_FINGERS]; NUM_FINGERS];
        for a in Finger::ALL {
            for b in Finger::ALL {
                if a.index() < b.index() {
                    let d = hand.landmark(a.tip()).distance(hand.landmark(b.tip())) / palm_size;
                    tip_distances[a.index()][b.index()] = d;
                    tip_distances[b.index()][a.index()] = d;
                }
            }
        }

        let thumb_axis = hand.landmark(THUMB_TIP).sub(hand.landmark(THUMB_MCP));
        let index_axis = hand.landmark(INDEX_TIP).sub(hand.landmark(INDEX_MCP));
        let thumb_index_angle = match angle_deg(thumb_axis, index_axis) {
            Some(angle) => angle,
            None => return Extraction::Indeterminate(IndeterminateReason::InvalidGeometry),
        };

        let across = hand.landmark(INDEX_MCP).sub(wrist);
        let down = hand.landmark(PINKY_MCP).sub(wrist);
        let mut palm_normal = match normalize(cross(across, down)) {
            Some(n) => n,
            None => return Extraction::Indeterminate(IndeterminateReason::InvalidGeometry),
        };
        // La mano izquierda es el espejo de la derecha: invertir para que la
        // normal apunte al mismo lado anatómico en ambas
        if hand.handedness == Handedness::Left {
            palm_normal = palm_normal.map(|c| -c);
        }

        let vector = FingerStateVector {
            extended,
            tip_distances,
            thumb_index_angle,
            palm_normal,
            palm_size,
        };
        trace!(
            pattern = %vector.pattern_string(),
            angle = vector.thumb_index_angle,
            "estado de dedos"
        );
        Extraction::Ready(vector)
    }

    /// El pulgar se extiende casi perpendicular al resto, así que se mide
    /// contra el MCP del meñique: plegado, la punta cruza la palma y queda más
    /// cerca de él que la IP. Independiente de rotación y lateralidad.
    fn thumb_extended(&self, hand: &HandFrame) -> bool {
        let anchor = hand.landmark(PINKY_MCP);
        let tip = hand.landmark(Finger::Thumb.tip()).distance(anchor);
        let ip = hand.landmark(Finger::Thumb.pip()).distance(anchor);
        tip > ip * self.config.thumb_extension_ratio
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(v: [f32; 3]) -> Option<[f32; 3]> {
    let norm = dot(v, v).sqrt();
    if norm < 1e-9 || !norm.is_finite() {
        return None;
    }
    Some([v[0] / norm, v[1] / norm, v[2] / norm])
}

fn angle_deg(a: [f32; 3], b: [f32; 3]) -> Option<f32> {
    let a = normalize(a)?;
    let b = normalize(b)?;
    Some(dot(a, b).clamp(-1.0, 1.0).acos().to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{HandBuilder, ThumbPose};

    #[test]
    fn open_hand_all_extended() {
        let hand = HandBuilder::new().fingers([true; 5]).build(0.0);
        let v = FeatureExtractor::default().extract(&hand);
        assert_eq!(v.ready().unwrap().pattern_string(), "TTTTT");
    }

    #[test]
    fn fist_all_folded() {
        let hand = HandBuilder::new().fingers([false; 5]).build(0.0);
        let v = FeatureExtractor::default().extract(&hand);
        assert_eq!(v.ready().unwrap().pattern_string(), "FFFFF");
    }

    #[test]
    fn peace_sign_pattern() {
        let hand = HandBuilder::new()
            .fingers([false, true, true, false, false])
            .build(0.0);
        let v = FeatureExtractor::default().extract(&hand);
        assert_eq!(v.ready().unwrap().pattern_string(), "FTTFF");
    }

    #[test]
    fn pinch_has_small_distance_and_angle() {
        let hand = HandBuilder::new()
            .fingers([true, true, false, false, false])
            .thumb(ThumbPose::Pinch)
            .build(0.0);
        let v = FeatureExtractor::default().extract(&hand);
        let v = v.ready().unwrap();
        assert_eq!(v.pattern_string(), "TTFFF");
        assert!(v.tip_distance(Finger::Thumb, Finger::Index) < 0.3);
        assert!(v.thumb_index_angle < 40.0, "angle {}", v.thumb_index_angle);
    }

    #[test]
    fn gun_has_wide_angle() {
        let hand = HandBuilder::new()
            .fingers([true, true, false, false, false])
            .thumb(ThumbPose::Gun)
            .build(0.0);
        let v = FeatureExtractor::default().extract(&hand);
        let v = v.ready().unwrap();
        assert_eq!(v.pattern_string(), "TTFFF");
        assert!(v.tip_distance(Finger::Thumb, Finger::Index) > 0.55);
        assert!(v.thumb_index_angle > 50.0, "angle {}", v.thumb_index_angle);
    }

    #[test]
    fn thumb_detection_is_rotation_invariant() {
        let upright = HandBuilder::new()
            .fingers([true, false, false, false, false])
            .build(0.0);
        let rotated = HandBuilder::new()
            .fingers([true, false, false, false, false])
            .rotate_deg(90.0)
            .build(0.0);
        let ex = FeatureExtractor::default();
        assert_eq!(ex.extract(&upright).ready().unwrap().pattern_string(), "TFFFF");
        assert_eq!(ex.extract(&rotated).ready().unwrap().pattern_string(), "TFFFF");
    }

    #[test]
    fn palm_normal_flips_with_handedness() {
        let right = HandBuilder::new().build(0.0);
        let left = HandBuilder::new().handedness(Handedness::Left).build(0.0);
        let ex = FeatureExtractor::default();
        let nr = ex.extract(&right).ready().unwrap().palm_normal;
        let nl = ex.extract(&left).ready().unwrap().palm_normal;
        assert!((nr[2] + nl[2]).abs() < 1e-6);
        assert!((dot(nr, nr) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn low_confidence_is_indeterminate() {
        let hand = HandBuilder::new().confidence(0.2).build(0.0);
        let v = FeatureExtractor::default().extract(&hand);
        assert!(matches!(
            v,
            Extraction::Indeterminate(IndeterminateReason::LowConfidence { .. })
        ));
    }

    #[test]
    fn nan_landmark_is_invalid_geometry() {
        let mut hand = HandBuilder::new().build(0.0);
        hand.landmarks[INDEX_TIP].x = f32::NAN;
        let v = FeatureExtractor::default().extract(&hand);
        assert_eq!(
            v,
            Extraction::Indeterminate(IndeterminateReason::InvalidGeometry)
        );
    }

    #[test]
    fn collapsed_hand_is_invalid_geometry() {
        let mut hand = HandBuilder::new().build(0.0);
        for lm in hand.landmarks.iter_mut() {
            *lm = crate::types::Landmark::new(0.5, 0.5, 0.0);
        }
        let v = FeatureExtractor::default().extract(&hand);
        assert_eq!(
            v,
            Extraction::Indeterminate(IndeterminateReason::InvalidGeometry)
        );
    }

    #[test]
    fn missing_landmark_by_confidence() {
        let mut hand = HandBuilder::new().build(0.0);
        hand.landmark_confidence = vec![0.9; NUM_LANDMARKS];
        hand.landmark_confidence[12] = 0.05;
        let ex = FeatureExtractor::new(ExtractorConfig {
            min_landmark_confidence: 0.3,
            ..ExtractorConfig::default()
        });
        assert_eq!(
            ex.extract(&hand),
            Extraction::Indeterminate(IndeterminateReason::MissingLandmark(12))
        );
    }
}
