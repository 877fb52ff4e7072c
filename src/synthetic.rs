//! Poses de mano sintéticas para tests y calibración.
//!
//! Geometría aproximada de una mano derecha erguida con la palma hacia la
//! cámara (y crece hacia abajo). Las poses están pensadas para caer con
//! margen a un lado u otro de los umbrales por defecto.

use crate::types::{
    HandFrame, Handedness, Landmark, Seconds, INDEX_MCP, INDEX_TIP, MIDDLE_MCP, NUM_LANDMARKS,
    PINKY_MCP, RING_MCP, THUMB_CMC, THUMB_IP, THUMB_MCP, THUMB_TIP, WRIST,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbPose {
    /// Extendido hacia fuera y arriba
    Open,
    /// Punta contra la punta del índice, ejes casi paralelos
    Pinch,
    /// Extendido en horizontal, perpendicular al índice
    Gun,
}

#[derive(Debug, Clone)]
pub struct HandBuilder {
    fingers: [bool; 5],
    thumb: ThumbPose,
    handedness: Handedness,
    confidence: f32,
    rotation_deg: f32,
    offset: (f32, f32),
    index_tip_target: Option<(f32, f32)>,
}

impl HandBuilder {
    pub fn new() -> Self {
        Self {
            fingers: [true; 5],
            thumb: ThumbPose::Open,
            handedness: Handedness::Right,
            confidence: 0.95,
            rotation_deg: 0.0,
            offset: (0.0, 0.0),
            index_tip_target: None,
        }
    }

    pub fn fingers(mut self, fingers: [bool; 5]) -> Self {
        self.fingers = fingers;
        self
    }

    /// Patrón "TTFFF"; cualquier carácter distinto de 'T' cuenta como plegado
    pub fn pattern(self, pattern: &str) -> Self {
        let mut fingers = [false; 5];
        for (slot, c) in fingers.iter_mut().zip(pattern.chars()) {
            *slot = c == 'T';
        }
        self.fingers(fingers)
    }

    pub fn thumb(mut self, pose: ThumbPose) -> Self {
        self.thumb = pose;
        self
    }

    pub fn handedness(mut self, handedness: Handedness) -> Self {
        self.handedness = handedness;
        self
    }

    pub fn confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn rotate_deg(mut self, deg: f32) -> Self {
        self.rotation_deg = deg;
        self
    }

    pub fn translate(mut self, dx: f32, dy: f32) -> Self {
        self.offset = (dx, dy);
        self
    }

    /// Desplaza la mano entera para que la punta del índice caiga en (x, y)
    pub fn index_tip_at(mut self, x: f32, y: f32) -> Self {
        self.index_tip_target = Some((x, y));
        self
    }

    pub fn build(&self, timestamp: Seconds) -> HandFrame {
        let mut lm = [Landmark::default(); NUM_LANDMARKS];
        lm[WRIST] = Landmark::new(0.50, 0.80, 0.0);
        lm[THUMB_CMC] = Landmark::new(0.44, 0.75, 0.0);
        lm[THUMB_MCP] = Landmark::new(0.40, 0.70, 0.0);

        let (ip, tip) = if !self.fingers[0] {
            ((0.36, 0.65), (0.47, 0.66))
        } else {
            match self.thumb {
                ThumbPose::Open => ((0.36, 0.65), (0.32, 0.60)),
                ThumbPose::Pinch => ((0.40, 0.55), (0.44, 0.45)),
                ThumbPose::Gun => ((0.33, 0.68), (0.26, 0.67)),
            }
        };
        lm[THUMB_IP] = Landmark::new(ip.0, ip.1, 0.0);
        lm[THUMB_TIP] = Landmark::new(tip.0, tip.1, 0.0);

        let mcps = [
            (INDEX_MCP, (0.45, 0.60)),
            (MIDDLE_MCP, (0.50, 0.58)),
            (RING_MCP, (0.55, 0.60)),
            (PINKY_MCP, (0.60, 0.63)),
        ];
        for (finger, (mcp_idx, (mx, my))) in mcps.into_iter().enumerate() {
            let offsets: [f32; 3] = if self.fingers[finger + 1] {
                [-0.08, -0.13, -0.17]
            } else {
                [-0.05, -0.02, 0.03]
            };
            lm[mcp_idx] = Landmark::new(mx, my, 0.0);
            for (joint, dy) in offsets.into_iter().enumerate() {
                lm[mcp_idx + joint + 1] = Landmark::new(mx, my + dy, 0.0);
            }
        }

        if self.rotation_deg != 0.0 {
            let (s, c) = self.rotation_deg.to_radians().sin_cos();
            let pivot = lm[WRIST];
            for p in lm.iter_mut() {
                let dx = p.x - pivot.x;
                let dy = p.y - pivot.y;
                p.x = pivot.x + c * dx - s * dy;
                p.y = pivot.y + s * dx + c * dy;
            }
        }

        let (mut ox, mut oy) = self.offset;
        if let Some((tx, ty)) = self.index_tip_target {
            ox = tx - lm[INDEX_TIP].x;
            oy = ty - lm[INDEX_TIP].y;
        }
        for p in lm.iter_mut() {
            p.x += ox;
            p.y += oy;
        }

        HandFrame::new(lm, self.handedness, self.confidence, timestamp)
    }
}

impl Default for HandBuilder {
    fn default() -> Self {
        Self::new()
    }
}
