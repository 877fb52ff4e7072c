//! Un paso completo por frame: extracción → clasificación → anti-rebote →
//! mapeo → filtro → despacho. Todo el estado vive aquí, en un solo hilo.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::coordinate_mapper::CoordinateMapper;
use crate::dispatcher::{ActionDispatcher, CursorAnchor};
use crate::error::Result;
use crate::feature_extractor::{Extraction, FeatureExtractor, IndeterminateReason};
use crate::gesture_classifier::{GestureClassifier, GestureId};
use crate::gesture_debouncer::{DebounceEvent, GestureDebouncer};
use crate::hid::{ActionIntent, ActionKind, Actuator, ActuatorError, Canvas};
use crate::mouse_filter::CursorFilter2D;
use crate::types::{DetectorFrame, Handedness, Seconds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Mouse,
    Draw,
}

/// Resumen de un frame procesado
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub timestamp: Seconds,
    /// Gesto estable vigente tras el frame
    pub stable: Option<GestureId>,
    pub state: &'static str,
    /// Motivo si el frame no aportó un vector de dedos
    pub skipped: Option<Skip>,
    pub events: Vec<DebounceEvent>,
    pub intents: Vec<ActionIntent>,
    /// Posición filtrada, si hubo ancla válida
    pub cursor: Option<(f32, f32)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Skip {
    NoHand,
    Indeterminate(IndeterminateReason),
}

pub struct Pipeline {
    extractor: FeatureExtractor,
    mouse_rules: GestureClassifier,
    draw_rules: GestureClassifier,
    debouncer: GestureDebouncer,
    mapper: CoordinateMapper,
    filter: CursorFilter2D,
    dispatcher: ActionDispatcher,
    mode: Mode,
    preferred_hand: Option<Handedness>,
    failures: u64,
}

impl Pipeline {
    /// Valida la configuración entera: una construida a mano no pasa por `Config::load`
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let mouse_rules = GestureClassifier::new(config.rules.clone())?;
        let draw_rules = GestureClassifier::new(config.draw_rules.clone())?;
        info!(
            "🖐️  Pipeline listo: {} reglas ratón, {} reglas dibujo, modo {:?}",
            config.rules.len(),
            config.draw_rules.len(),
            config.pipeline.mode
        );
        Ok(Self {
            extractor: FeatureExtractor::new(config.extractor.clone()),
            mouse_rules,
            draw_rules,
            debouncer: GestureDebouncer::new(config.debounce.clone()),
            mapper: CoordinateMapper::new(config.region, config.output),
            filter: CursorFilter2D::new(config.filter),
            dispatcher: ActionDispatcher::new(config.dispatch.clone()),
            mode: config.pipeline.mode,
            preferred_hand: config.pipeline.preferred_hand,
            failures: 0,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn debouncer(&self) -> &GestureDebouncer {
        &self.debouncer
    }

    /// Fallos de actuador absorbidos desde el arranque
    pub fn failures(&self) -> u64 {
        self.failures
    }

    fn classifier(&self) -> &GestureClassifier {
        match self.mode {
            Mode::Mouse => &self.mouse_rules,
            Mode::Draw => &self.draw_rules,
        }
    }

    fn anchor(&self) -> CursorAnchor {
        let config = self.dispatcher.config();
        match self.mode {
            Mode::Mouse => config.mouse_anchor,
            Mode::Draw => config.draw_anchor,
        }
    }

    /// Procesa un frame sin tocar colaboradores externos
    pub fn step(&mut self, frame: &DetectorFrame) -> FrameReport {
        let now = frame.timestamp;
        let hand = frame.select_hand(self.preferred_hand);

        let mut skipped = None;
        let mut raw_cursor = None;
        let events = match hand {
            Some(hand) => match self.extractor.extract(hand) {
                Extraction::Ready(v) => {
                    let candidate = self.classifier().classify(&v);
                    trace!(
                        "{} → {}",
                        v.pattern_string(),
                        candidate.as_ref().map_or("NEUTRAL", |g| g.id.as_str())
                    );
                    raw_cursor = self.mapper.map_landmark(self.anchor().locate(hand));
                    self.debouncer.observe(candidate, now)
                }
                Extraction::Indeterminate(reason) => {
                    skipped = Some(Skip::Indeterminate(reason));
                    self.debouncer.observe_missing(now)
                }
            },
            None => {
                skipped = Some(Skip::NoHand);
                self.debouncer.observe_missing(now)
            }
        };

        let stop_fired = events.iter().any(|e| {
            matches!(
                e,
                DebounceEvent::Fired {
                    action: ActionKind::Stop,
                    ..
                }
            )
        });
        let hand_lost = skipped.is_some() && events.contains(&DebounceEvent::BecameNeutral);
        if stop_fired || hand_lost {
            debug!("🧹 Reinicio del filtro de cursor");
            self.filter.reset();
        }

        let cursor = raw_cursor.map(|p| self.filter.filter(p, now));
        let intents = self
            .dispatcher
            .dispatch(&events, self.debouncer.stable_action(), cursor);

        FrameReport {
            timestamp: now,
            stable: self.debouncer.stable().map(|g| g.id.clone()),
            state: self.debouncer.state_name(),
            skipped,
            events,
            intents,
            cursor,
        }
    }

    /// Sondeo sin frame nuevo: recorre el camino de mano perdida
    pub fn tick(&mut self, now: Seconds) -> FrameReport {
        self.step(&DetectorFrame::empty(now))
    }

    /// Paso completo con entrega a los colaboradores
    pub fn process<A, C>(&mut self, frame: &DetectorFrame, actuator: &mut A, canvas: &mut C) -> FrameReport
    where
        A: Actuator + ?Sized,
        C: Canvas + ?Sized,
    {
        let report = self.step(frame);
        self.deliver(&report.intents, actuator, canvas);
        report
    }

    /// Entrega intenciones en orden. Un fallo del actuador nunca se propaga:
    /// se registra, se fuerza NEUTRAL y se bloquea el gesto que lo provocó.
    pub fn deliver<A, C>(&mut self, intents: &[ActionIntent], actuator: &mut A, canvas: &mut C) -> bool
    where
        A: Actuator + ?Sized,
        C: Canvas + ?Sized,
    {
        for intent in intents {
            if intent.is_canvas() {
                draw(intent, canvas);
                continue;
            }
            if let Err(e) = actuator.perform(intent) {
                self.on_actuator_failure(e, actuator, canvas);
                return false;
            }
        }
        true
    }

    fn on_actuator_failure<A, C>(&mut self, error: ActuatorError, actuator: &mut A, canvas: &mut C)
    where
        A: Actuator + ?Sized,
        C: Canvas + ?Sized,
    {
        self.failures += 1;
        warn!("❌ Fallo del actuador ({}): forzando NEUTRAL", error);

        let events = self.debouncer.latch_failure();
        self.filter.reset();
        if self.dispatcher.interrupt().is_some() {
            canvas.end_stroke();
        }
        let held_drag = events.iter().any(|e| {
            matches!(
                e,
                DebounceEvent::Released {
                    action: ActionKind::Drag,
                    ..
                }
            )
        });
        if held_drag {
            if let Err(e) = actuator.drag_end() {
                warn!("⚠️  No se pudo soltar el drag: {}", e);
            }
        }
    }

    /// Cambia de tabla de gestos. Suelta lo que estuviera activo.
    pub fn set_mode(&mut self, mode: Mode) -> Vec<ActionIntent> {
        if mode == self.mode {
            return Vec::new();
        }
        info!("🎨 Modo {:?} → {:?}", self.mode, mode);
        self.mode = mode;
        self.release_all()
    }

    /// Borra el lienzo (petición explícita del usuario)
    pub fn clear_canvas(&mut self) -> Vec<ActionIntent> {
        self.dispatcher.clear_canvas()
    }

    /// NEUTRAL inmediato, filtro limpio y todo soltado
    pub fn release_all(&mut self) -> Vec<ActionIntent> {
        let events = self.debouncer.force_neutral();
        self.filter.reset();
        let mut intents = self.dispatcher.dispatch(&events, ActionKind::None, None);
        if let Some(end) = self.dispatcher.interrupt() {
            intents.push(end);
        }
        intents
    }
}

/// El lienzo no falla: sus intenciones nunca pasan por el latch
fn draw<C: Canvas + ?Sized>(intent: &ActionIntent, canvas: &mut C) {
    match *intent {
        ActionIntent::Stroke { x, y, color, width } => canvas.stroke((x, y), color, width),
        ActionIntent::EndStroke => canvas.end_stroke(),
        ActionIntent::ClearCanvas => canvas.clear(),
        _ => {}
    }
}
