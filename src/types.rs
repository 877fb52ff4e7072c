use serde::{Deserialize, Serialize};

/// Landmarks por mano que entrega el detector externo
pub const NUM_LANDMARKS: usize = 21;
pub const NUM_FINGERS: usize = 5;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Timestamp de frame en segundos (monótono, origen arbitrario)
pub type Seconds = f64;

/// Un punto 3D normalizado [0,1] en espacio de cámara
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn sub(self, other: Self) -> [f32; 3] {
        [self.x - other.x, self.y - other.y, self.z - other.z]
    }

    pub fn distance(self, other: Self) -> f32 {
        let [dx, dy, dz] = self.sub(other);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn midpoint(self, other: Self) -> Self {
        Self {
            x: (self.x + other.x) * 0.5,
            y: (self.y + other.y) * 0.5,
            z: (self.z + other.z) * 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Some(Self::Left),
            "right" | "r" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Dedos en el orden del vector de extensión: pulgar primero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; NUM_FINGERS] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn tip(self) -> usize {
        match self {
            Finger::Thumb => THUMB_TIP,
            Finger::Index => INDEX_TIP,
            Finger::Middle => MIDDLE_TIP,
            Finger::Ring => RING_TIP,
            Finger::Pinky => PINKY_TIP,
        }
    }

    /// Articulación intermedia usada como referencia de extensión
    pub fn pip(self) -> usize {
        match self {
            Finger::Thumb => THUMB_IP,
            Finger::Index => INDEX_PIP,
            Finger::Middle => MIDDLE_PIP,
            Finger::Ring => RING_PIP,
            Finger::Pinky => PINKY_PIP,
        }
    }

    pub fn mcp(self) -> usize {
        match self {
            Finger::Thumb => THUMB_MCP,
            Finger::Index => INDEX_MCP,
            Finger::Middle => MIDDLE_MCP,
            Finger::Ring => RING_MCP,
            Finger::Pinky => PINKY_MCP,
        }
    }
}

/// Una mano detectada en un frame: 21 landmarks + lateralidad + confianza
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandFrame {
    pub landmarks: [Landmark; NUM_LANDMARKS],
    /// Confianza por landmark; vacío si el detector no la reporta
    #[serde(default)]
    pub landmark_confidence: Vec<f32>,
    pub handedness: Handedness,
    pub confidence: f32,
    pub timestamp: Seconds,
}

impl HandFrame {
    pub fn new(
        landmarks: [Landmark; NUM_LANDMARKS],
        handedness: Handedness,
        confidence: f32,
        timestamp: Seconds,
    ) -> Self {
        Self {
            landmarks,
            landmark_confidence: Vec::new(),
            handedness,
            confidence,
            timestamp,
        }
    }

    pub fn landmark(&self, idx: usize) -> Landmark {
        self.landmarks[idx]
    }

    /// Confianza de un landmark concreto (la global si no hay dato por punto)
    pub fn landmark_confidence(&self, idx: usize) -> f32 {
        self.landmark_confidence
            .get(idx)
            .copied()
            .unwrap_or(self.confidence)
    }
}

/// Lo que entrega la fuente de landmarks en cada frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorFrame {
    pub timestamp: Seconds,
    #[serde(default)]
    pub hands: Vec<HandFrame>,
}

impl DetectorFrame {
    pub fn empty(timestamp: Seconds) -> Self {
        Self {
            timestamp,
            hands: Vec::new(),
        }
    }

    /// Elige una sola mano activa: la lateralidad preferida si aparece,
    /// si no la de mayor confianza. Una confianza no finita nunca gana a una
    /// mano válida; solo se elige si no hay otra.
    pub fn select_hand(&self, preferred: Option<Handedness>) -> Option<&HandFrame> {
        let usable = |h: &&HandFrame| h.confidence.is_finite();
        let by_confidence = |a: &&HandFrame, b: &&HandFrame| a.confidence.total_cmp(&b.confidence);
        if let Some(pref) = preferred {
            let best_preferred = self
                .hands
                .iter()
                .filter(usable)
                .filter(|h| h.handedness == pref)
                .max_by(by_confidence);
            if best_preferred.is_some() {
                return best_preferred;
            }
        }
        self.hands
            .iter()
            .filter(usable)
            .max_by(by_confidence)
            .or_else(|| self.hands.first())
    }
}
