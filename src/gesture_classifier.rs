use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::feature_extractor::FingerStateVector;
use crate::hid::{ActionClass, ActionKind};
use crate::types::{Finger, NUM_FINGERS};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("Invalid finger pattern {0:?}: expected 5 characters of T, F or *")]
    InvalidPattern(String),

    #[error("Gesture rule with empty name")]
    EmptyName,

    #[error("Duplicate gesture rule name: {0}")]
    DuplicateRule(String),

    #[error("Rule {rule}: condition on {feature} has no bound")]
    EmptyCondition { rule: String, feature: String },

    #[error("Rule {rule}: condition on {feature} can never hold (below {below} <= above {above})")]
    UnsatisfiableCondition {
        rule: String,
        feature: String,
        below: f32,
        above: f32,
    },

    #[error("Rule {rule}: invalid {field} {value}")]
    InvalidDuration {
        rule: String,
        field: &'static str,
        value: f64,
    },
}

/// Requisito de un dedo dentro de un patrón
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerMatch {
    Extended,
    Folded,
    Any,
}

impl FingerMatch {
    fn accepts(self, extended: bool) -> bool {
        match self {
            FingerMatch::Extended => extended,
            FingerMatch::Folded => !extended,
            FingerMatch::Any => true,
        }
    }

    fn as_char(self) -> char {
        match self {
            FingerMatch::Extended => 'T',
            FingerMatch::Folded => 'F',
            FingerMatch::Any => '*',
        }
    }
}

/// Patrón booleano con "no importa" por dedo, escrito como "*TFFF"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FingerPattern([FingerMatch; NUM_FINGERS]);

impl FingerPattern {
    pub fn new(fingers: [FingerMatch; NUM_FINGERS]) -> Self {
        Self(fingers)
    }

    pub fn parse(s: &str) -> Result<Self, ClassifierError> {
        let chars: Vec<char> = s.trim().chars().collect();
        if chars.len() != NUM_FINGERS {
            return Err(ClassifierError::InvalidPattern(s.to_string()));
        }
        let mut fingers = [FingerMatch::Any; NUM_FINGERS];
        for (slot, c) in fingers.iter_mut().zip(chars) {
            *slot = match c.to_ascii_uppercase() {
                'T' => FingerMatch::Extended,
                'F' => FingerMatch::Folded,
                '*' | '?' => FingerMatch::Any,
                _ => return Err(ClassifierError::InvalidPattern(s.to_string())),
            };
        }
        Ok(Self(fingers))
    }

    pub fn finger(&self, finger: Finger) -> FingerMatch {
        self.0[finger.index()]
    }

    pub fn matches(&self, extended: &[bool; NUM_FINGERS]) -> bool {
        self.0
            .iter()
            .zip(extended)
            .all(|(m, &e)| m.accepts(e))
    }

    /// Algún vector de extensión satisface ambos patrones
    pub fn overlaps(&self, other: &FingerPattern) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| {
            !matches!(
                (a, b),
                (FingerMatch::Extended, FingerMatch::Folded)
                    | (FingerMatch::Folded, FingerMatch::Extended)
            )
        })
    }

    /// Todo vector que satisface `other` satisface también `self`
    pub fn covers(&self, other: &FingerPattern) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| *a == FingerMatch::Any || a == b)
    }
}

impl fmt::Display for FingerPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in self.0 {
            write!(f, "{}", m.as_char())?;
        }
        Ok(())
    }
}

impl TryFrom<String> for FingerPattern {
    type Error = ClassifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FingerPattern::parse(&value)
    }
}

impl From<FingerPattern> for String {
    fn from(p: FingerPattern) -> Self {
        p.to_string()
    }
}

/// Rasgo continuo sobre el que se evalúa un predicado geométrico
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryFeature {
    /// Distancia entre dos puntas, en tamaños de palma
    TipDistance(Finger, Finger),
    /// Ángulo pulgar–índice en grados
    ThumbIndexAngle,
    /// Componente z de la normal de la palma (hacia la cámara < 0)
    PalmFacing,
}

impl GeometryFeature {
    pub fn value(&self, v: &FingerStateVector) -> f32 {
        match *self {
            GeometryFeature::TipDistance(a, b) => v.tip_distance(a, b),
            GeometryFeature::ThumbIndexAngle => v.thumb_index_angle,
            GeometryFeature::PalmFacing => v.palm_normal[2],
        }
    }
}

impl fmt::Display for GeometryFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryFeature::TipDistance(a, b) => write!(f, "tip_distance({:?}, {:?})", a, b),
            GeometryFeature::ThumbIndexAngle => write!(f, "thumb_index_angle"),
            GeometryFeature::PalmFacing => write!(f, "palm_facing"),
        }
    }
}

/// Condición `above < valor < below` sobre un rasgo; una cota ausente no limita
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub feature: GeometryFeature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub above: Option<f32>,
}

impl Condition {
    pub fn below(feature: GeometryFeature, limit: f32) -> Self {
        Self {
            feature,
            below: Some(limit),
            above: None,
        }
    }

    pub fn above(feature: GeometryFeature, limit: f32) -> Self {
        Self {
            feature,
            below: None,
            above: Some(limit),
        }
    }

    pub fn holds(&self, v: &FingerStateVector) -> bool {
        let value = self.feature.value(v);
        self.below.map_or(true, |b| value < b) && self.above.map_or(true, |a| value > a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefirePolicy {
    /// Mientras se mantiene el gesto, vuelve a disparar cada vez que vence el cooldown
    #[default]
    AfterCooldown,
    /// Un disparo por mantenimiento; hay que salir del gesto para rearmar
    OncePerHold,
}

/// Regla estática de la tabla de gestos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureRule {
    pub name: String,
    pub pattern: FingerPattern,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predicate: Vec<Condition>,
    /// Menor = se evalúa antes
    pub priority: u32,
    pub action: ActionKind,
    /// Segundos que el candidato debe persistir antes de ser estable
    pub stability: f64,
    /// Segundos mínimos entre disparos de la acción
    pub cooldown: f64,
    #[serde(default)]
    pub refire: RefirePolicy,
}

impl GestureRule {
    /// Regla con patrón ya validado; los textos pasan antes por `FingerPattern::parse`
    pub fn new(name: &str, pattern: FingerPattern, priority: u32, action: ActionKind) -> Self {
        Self {
            name: name.to_string(),
            pattern,
            predicate: Vec::new(),
            priority,
            action,
            stability: 0.15,
            cooldown: 0.0,
            refire: RefirePolicy::AfterCooldown,
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.predicate.push(condition);
        self
    }

    pub fn timing(mut self, stability: f64, cooldown: f64) -> Self {
        self.stability = stability;
        self.cooldown = cooldown;
        self
    }

    pub fn refire(mut self, policy: RefirePolicy) -> Self {
        self.refire = policy;
        self
    }

    pub fn matches(&self, v: &FingerStateVector) -> bool {
        self.pattern.matches(&v.extended) && self.predicate.iter().all(|c| c.holds(v))
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        if self.name.trim().is_empty() {
            return Err(ClassifierError::EmptyName);
        }
        for (field, value) in [("stability", self.stability), ("cooldown", self.cooldown)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ClassifierError::InvalidDuration {
                    rule: self.name.clone(),
                    field,
                    value,
                });
            }
        }
        for c in &self.predicate {
            match (c.below, c.above) {
                (None, None) => {
                    return Err(ClassifierError::EmptyCondition {
                        rule: self.name.clone(),
                        feature: c.feature.to_string(),
                    })
                }
                (Some(below), Some(above)) if below <= above => {
                    return Err(ClassifierError::UnsatisfiableCondition {
                        rule: self.name.clone(),
                        feature: c.feature.to_string(),
                        below,
                        above,
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Nombre de gesto barato de clonar
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GestureId(Arc<str>);

impl GestureId {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GestureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Gesto candidato con los parámetros de su regla
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedGesture {
    pub id: GestureId,
    pub action: ActionKind,
    pub stability: f64,
    pub cooldown: f64,
    pub refire: RefirePolicy,
}

impl MatchedGesture {
    /// Las acciones de mantenimiento nunca se repiten dentro del mismo gesto
    pub fn effective_refire(&self) -> RefirePolicy {
        if self.action.class() == ActionClass::Hold {
            RefirePolicy::OncePerHold
        } else {
            self.refire
        }
    }
}

struct CompiledRule {
    id: GestureId,
    rule: GestureRule,
}

/// Clasificador por tabla ordenada de reglas. Sin estado mutable.
pub struct GestureClassifier {
    rules: Vec<CompiledRule>,
    shadowed: Vec<String>,
}

impl GestureClassifier {
    pub fn new(rules: Vec<GestureRule>) -> Result<Self, ClassifierError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            rule.validate()?;
            if !seen.insert(rule.name.clone()) {
                return Err(ClassifierError::DuplicateRule(rule.name.clone()));
            }
        }

        // orden estable: a igual prioridad manda el orden de la tabla
        let mut rules = rules;
        rules.sort_by_key(|r| r.priority);

        let mut shadowed = Vec::new();
        for (j, later) in rules.iter().enumerate() {
            for earlier in &rules[..j] {
                if earlier.predicate.is_empty() && earlier.pattern.covers(&later.pattern) {
                    warn!(
                        "⚠️  La regla {} nunca coincidirá: la tapa {} ({})",
                        later.name, earlier.name, earlier.pattern
                    );
                    shadowed.push(later.name.clone());
                    break;
                }
                if earlier.priority == later.priority
                    && earlier.pattern.overlaps(&later.pattern)
                    && earlier.predicate.is_empty()
                    && later.predicate.is_empty()
                {
                    debug!(
                        "Reglas {} y {} se solapan con igual prioridad; gana {}",
                        earlier.name, later.name, earlier.name
                    );
                }
            }
        }

        let rules = rules
            .into_iter()
            .map(|rule| CompiledRule {
                id: GestureId::new(&rule.name),
                rule,
            })
            .collect();

        Ok(Self { rules, shadowed })
    }

    /// Primera regla (prioridad ascendente) cuyo patrón y predicado se cumplen;
    /// None = NEUTRAL
    pub fn classify(&self, v: &FingerStateVector) -> Option<MatchedGesture> {
        self.rules
            .iter()
            .find(|c| c.rule.matches(v))
            .map(|c| MatchedGesture {
                id: c.id.clone(),
                action: c.rule.action,
                stability: c.rule.stability,
                cooldown: c.rule.cooldown,
                refire: c.rule.refire,
            })
    }

    /// Reglas en orden de evaluación
    pub fn rules(&self) -> impl Iterator<Item = &GestureRule> {
        self.rules.iter().map(|c| &c.rule)
    }

    /// Reglas que ninguna entrada puede alcanzar
    pub fn shadowed_rules(&self) -> &[String] {
        &self.shadowed
    }
}

/// Umbrales de pinza y pistola: comparten patrón TTFFF y solo se distinguen
/// por la geometría pulgar–índice
pub const PINCH_MAX_DISTANCE: f32 = 0.30;
pub const PINCH_MAX_ANGLE: f32 = 40.0;
pub const GUN_MIN_DISTANCE: f32 = 0.55;
pub const GUN_MIN_ANGLE: f32 = 50.0;

fn pinch_rule(name: &str, action: ActionKind) -> GestureRule {
    use FingerMatch::{Extended as T, Folded as F};

    GestureRule::new(name, FingerPattern::new([T, T, F, F, F]), 10, action)
        .when(Condition::below(
            GeometryFeature::TipDistance(Finger::Thumb, Finger::Index),
            PINCH_MAX_DISTANCE,
        ))
        .when(Condition::below(
            GeometryFeature::ThumbIndexAngle,
            PINCH_MAX_ANGLE,
        ))
}

/// Tabla por defecto del modo ratón
pub fn default_mouse_rules() -> Vec<GestureRule> {
    use FingerMatch::{Any as X, Extended as T, Folded as F};

    vec![
        GestureRule::new("STOP", FingerPattern::new([T, T, T, T, T]), 0, ActionKind::Stop)
            .timing(0.15, 1.0),
        pinch_rule("PINCH", ActionKind::LeftClick).timing(0.15, 1.0),
        GestureRule::new(
            "GUN",
            FingerPattern::new([T, T, F, F, F]),
            11,
            ActionKind::DoubleClick,
        )
        .when(Condition::above(
            GeometryFeature::TipDistance(Finger::Thumb, Finger::Index),
            GUN_MIN_DISTANCE,
        ))
        .when(Condition::above(
            GeometryFeature::ThumbIndexAngle,
            GUN_MIN_ANGLE,
        ))
        .timing(0.15, 1.0),
        GestureRule::new("POINT", FingerPattern::new([X, T, F, F, F]), 20, ActionKind::MoveCursor)
            .timing(0.05, 0.0),
        GestureRule::new("SCROLL_UP", FingerPattern::new([F, T, T, F, F]), 30, ActionKind::ScrollUp)
            .timing(0.10, 0.025),
        GestureRule::new("SCROLL_DOWN", FingerPattern::new([F, T, T, T, F]), 30, ActionKind::ScrollDown)
            .timing(0.10, 0.025),
        GestureRule::new("RIGHT_CLICK", FingerPattern::new([F, T, T, T, T]), 40, ActionKind::RightClick)
            .timing(0.15, 1.0),
        GestureRule::new("DRAG", FingerPattern::new([T, F, F, F, F]), 50, ActionKind::Drag)
            .timing(0.20, 0.0),
    ]
}

/// Tabla por defecto del modo dibujo: pinza dibuja, pulgar solo borra
pub fn default_draw_rules() -> Vec<GestureRule> {
    use FingerMatch::{Any as X, Extended as T, Folded as F};

    vec![
        GestureRule::new("STOP", FingerPattern::new([T, T, T, T, T]), 0, ActionKind::Stop)
            .timing(0.15, 1.0),
        pinch_rule("PINCH", ActionKind::DrawStroke).timing(0.05, 0.0),
        GestureRule::new("POINT", FingerPattern::new([X, T, F, F, F]), 20, ActionKind::MoveCursor)
            .timing(0.05, 0.0),
        GestureRule::new("ERASE", FingerPattern::new([T, F, F, F, F]), 50, ActionKind::Erase)
            .timing(0.10, 0.0),
    ]
}
