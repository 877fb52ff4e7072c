use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::gesture_classifier::{GestureId, MatchedGesture, RefirePolicy};
use crate::hid::{ActionClass, ActionKind};
use crate::types::Seconds;

/// Parámetros del anti-rebote
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Segundos que NEUTRAL debe persistir para desplazar a un gesto estable (default: 0.1)
    pub neutral_stability: Seconds,
    /// Tolerancia a frames sin mano antes de forzar NEUTRAL (default: 0.2)
    pub missing_grace: Seconds,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            neutral_stability: 0.1,
            missing_grace: 0.2,
        }
    }
}

/// Lo que el anti-rebote comunica al despachador en cada frame
#[derive(Debug, Clone, PartialEq)]
pub enum DebounceEvent {
    /// La acción del gesto estable debe ejecutarse ahora
    Fired { gesture: GestureId, action: ActionKind },
    /// Se abandonó un gesto de mantenimiento que había disparado (fin de drag)
    Released { gesture: GestureId, action: ActionKind },
    BecameStable(GestureId),
    BecameNeutral,
}

#[derive(Debug, Clone)]
struct Held {
    gesture: MatchedGesture,
    since: Seconds,
    /// Ya disparó al menos una vez durante este mantenimiento
    fired: bool,
}

/// Estados de la máquina de anti-rebote
#[derive(Debug, Clone)]
enum State {
    Neutral,
    /// `subject` None = candidato NEUTRAL desplazando a un estable
    Candidate {
        subject: Option<MatchedGesture>,
        since: Seconds,
        previous: Option<Held>,
    },
    Stable(Held),
}

/// Máquina NEUTRAL / CANDIDATE / STABLE con cooldown por tipo de acción
pub struct GestureDebouncer {
    config: DebounceConfig,
    state: State,
    last_fired: HashMap<ActionKind, Seconds>,
    last_seen: Option<Seconds>,
    /// Gesto bloqueado tras un fallo del actuador hasta que el clasificador cambie
    suppressed: Option<GestureId>,
}

fn same(a: Option<&MatchedGesture>, b: Option<&MatchedGesture>) -> bool {
    a.map(|g| &g.id) == b.map(|g| &g.id)
}

impl GestureDebouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            state: State::Neutral,
            last_fired: HashMap::new(),
            last_seen: None,
            suppressed: None,
        }
    }

    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    /// Procesa la salida del clasificador para un frame válido
    pub fn observe(&mut self, candidate: Option<MatchedGesture>, now: Seconds) -> Vec<DebounceEvent> {
        self.last_seen = Some(now);

        let candidate = match self.suppressed.take() {
            Some(blocked) if candidate.as_ref().map_or(false, |g| g.id == blocked) => {
                self.suppressed = Some(blocked);
                None
            }
            Some(_) => {
                debug!("🔓 Gesto desbloqueado");
                candidate
            }
            None => candidate,
        };

        let mut events = Vec::new();
        self.step(candidate, now, &mut events);
        events
    }

    /// Frame sin mano o indeterminado: no cambia nada dentro del periodo de gracia
    pub fn observe_missing(&mut self, now: Seconds) -> Vec<DebounceEvent> {
        if matches!(self.state, State::Neutral) {
            return Vec::new();
        }
        let expired = self
            .last_seen
            .map_or(true, |seen| now - seen >= self.config.missing_grace);
        if !expired {
            return Vec::new();
        }
        debug!("👻 Mano perdida más de {:.3}s: NEUTRAL", self.config.missing_grace);
        self.force_neutral()
    }

    /// Transición inmediata a NEUTRAL, soltando cualquier drag activo
    pub fn force_neutral(&mut self) -> Vec<DebounceEvent> {
        let mut events = Vec::new();
        let held = match std::mem::replace(&mut self.state, State::Neutral) {
            State::Neutral => return events,
            State::Stable(held) => Some(held),
            State::Candidate { previous, .. } => previous,
        };
        if let Some(held) = held {
            Self::release(held, &mut events);
        }
        events.push(DebounceEvent::BecameNeutral);
        events
    }

    /// Tras un fallo del actuador: fuerza NEUTRAL y bloquea el gesto activo
    pub fn latch_failure(&mut self) -> Vec<DebounceEvent> {
        let active = match &self.state {
            State::Neutral => None,
            State::Stable(held) => Some(held.gesture.id.clone()),
            // lo que falló es la acción del estable vigente, no el candidato
            State::Candidate { subject, previous, .. } => previous
                .as_ref()
                .map(|h| h.gesture.id.clone())
                .or_else(|| subject.as_ref().map(|g| g.id.clone())),
        };
        if let Some(id) = &active {
            warn!("🔒 Gesto {} bloqueado hasta que cambie la pose", id);
        }
        self.suppressed = active;
        self.force_neutral()
    }

    /// Gesto estable vigente; durante un candidato sigue vigente el anterior
    pub fn stable(&self) -> Option<&MatchedGesture> {
        match &self.state {
            State::Neutral => None,
            State::Stable(held) => Some(&held.gesture),
            State::Candidate { previous, .. } => previous.as_ref().map(|h| &h.gesture),
        }
    }

    pub fn stable_action(&self) -> ActionKind {
        self.stable().map_or(ActionKind::None, |g| g.action)
    }

    /// Instante en que el gesto estable vigente se estabilizó
    pub fn stable_since(&self) -> Option<Seconds> {
        match &self.state {
            State::Stable(held) => Some(held.since),
            State::Candidate { previous, .. } => previous.as_ref().map(|h| h.since),
            State::Neutral => None,
        }
    }

    /// Candidato pendiente: Some(None) = NEUTRAL esperando estabilizarse
    pub fn pending(&self) -> Option<Option<&GestureId>> {
        match &self.state {
            State::Candidate { subject, .. } => Some(subject.as_ref().map(|g| &g.id)),
            _ => None,
        }
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self.state, State::Neutral)
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            State::Neutral => "NEUTRAL",
            State::Candidate { .. } => "CANDIDATE",
            State::Stable(_) => "STABLE",
        }
    }

    fn step(&mut self, candidate: Option<MatchedGesture>, now: Seconds, events: &mut Vec<DebounceEvent>) {
        let state = std::mem::replace(&mut self.state, State::Neutral);
        self.state = match state {
            State::Neutral => match candidate {
                None => State::Neutral,
                subject => self.begin_candidate(subject, now, None, events),
            },
            State::Stable(mut held) => {
                if same(candidate.as_ref(), Some(&held.gesture)) {
                    self.maybe_fire(&mut held, now, events);
                    State::Stable(held)
                } else {
                    self.begin_candidate(candidate, now, Some(held), events)
                }
            }
            State::Candidate {
                subject,
                since,
                previous,
            } => {
                if same(candidate.as_ref(), subject.as_ref()) {
                    self.try_promote(subject, since, previous, now, events)
                } else {
                    // parpadeo: se descarta el candidato y se reevalúa sobre el estable previo
                    debug!(
                        "〰️  Candidato {} descartado tras {:.3}s",
                        subject.as_ref().map_or("NEUTRAL", |g| g.id.as_str()),
                        now - since
                    );
                    self.state = match previous {
                        Some(held) => State::Stable(held),
                        None => State::Neutral,
                    };
                    self.step(candidate, now, events);
                    return;
                }
            }
        };
    }

    fn begin_candidate(
        &mut self,
        subject: Option<MatchedGesture>,
        now: Seconds,
        previous: Option<Held>,
        events: &mut Vec<DebounceEvent>,
    ) -> State {
        self.try_promote(subject, now, previous, now, events)
    }

    fn try_promote(
        &mut self,
        subject: Option<MatchedGesture>,
        since: Seconds,
        previous: Option<Held>,
        now: Seconds,
        events: &mut Vec<DebounceEvent>,
    ) -> State {
        let stability = subject
            .as_ref()
            .map_or(self.config.neutral_stability, |g| g.stability);
        if now - since < stability {
            return State::Candidate {
                subject,
                since,
                previous,
            };
        }

        if let Some(held) = previous {
            Self::release(held, events);
        }
        match subject {
            Some(gesture) => {
                debug!("✅ {} estable ({})", gesture.id, gesture.action.as_str());
                events.push(DebounceEvent::BecameStable(gesture.id.clone()));
                let mut held = Held {
                    gesture,
                    since: now,
                    fired: false,
                };
                self.maybe_fire(&mut held, now, events);
                State::Stable(held)
            }
            None => {
                debug!("⚪ NEUTRAL");
                events.push(DebounceEvent::BecameNeutral);
                State::Neutral
            }
        }
    }

    fn maybe_fire(&mut self, held: &mut Held, now: Seconds, events: &mut Vec<DebounceEvent>) {
        let gesture = &held.gesture;
        if gesture.action.class() == ActionClass::Inert {
            return;
        }
        if held.fired && gesture.effective_refire() == RefirePolicy::OncePerHold {
            return;
        }
        let ready = self
            .last_fired
            .get(&gesture.action)
            .map_or(true, |&t| now - t >= gesture.cooldown);
        if !ready {
            return;
        }
        self.last_fired.insert(gesture.action, now);
        held.fired = true;
        debug!("🔥 {} → {}", gesture.id, gesture.action.as_str());
        events.push(DebounceEvent::Fired {
            gesture: gesture.id.clone(),
            action: gesture.action,
        });
    }

    fn release(held: Held, events: &mut Vec<DebounceEvent>) {
        if held.fired && held.gesture.action.class() == ActionClass::Hold {
            debug!("🖐️  Suelta {}", held.gesture.id);
            events.push(DebounceEvent::Released {
                gesture: held.gesture.id,
                action: held.gesture.action,
            });
        }
    }
}

impl Default for GestureDebouncer {
    fn default() -> Self {
        Self::new(DebounceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // pasos binarios exactos para que las comparaciones de tiempo no dependan del redondeo
    const DT: f64 = 1.0 / 16.0;

    fn gesture(name: &str, action: ActionKind, stability: f64, cooldown: f64) -> MatchedGesture {
        MatchedGesture {
            id: GestureId::new(name),
            action,
            stability,
            cooldown,
            refire: RefirePolicy::AfterCooldown,
        }
    }

    fn fired(events: &[DebounceEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, DebounceEvent::Fired { .. }))
            .count()
    }

    fn click() -> MatchedGesture {
        gesture("PINCH", ActionKind::LeftClick, 0.25, 1.0)
    }

    #[test]
    fn starts_neutral() {
        let d = GestureDebouncer::default();
        assert!(d.is_neutral());
        assert_eq!(d.stable_action(), ActionKind::None);
    }

    #[test]
    fn candidate_below_stability_never_fires() {
        let mut d = GestureDebouncer::default();
        let mut total = 0;
        // 0.25 - DT sostenido, luego desaparece
        for k in 0..4 {
            total += fired(&d.observe(Some(click()), k as f64 * DT));
        }
        assert_eq!(d.state_name(), "CANDIDATE");
        total += fired(&d.observe(None, 4.0 * DT));
        assert_eq!(total, 0);
        assert!(d.is_neutral());
    }

    #[test]
    fn candidate_at_stability_fires_exactly_once() {
        let mut d = GestureDebouncer::default();
        let mut total = 0;
        for k in 0..=8 {
            total += fired(&d.observe(Some(click()), k as f64 * DT));
        }
        assert_eq!(total, 1);
        assert_eq!(d.stable_action(), ActionKind::LeftClick);
        assert_eq!(d.stable_since(), Some(0.25));
    }

    #[test]
    fn discrete_refires_only_after_cooldown_while_held() {
        let mut d = GestureDebouncer::default();
        let mut fire_times = Vec::new();
        for k in 0..=48 {
            let t = k as f64 * DT;
            if fired(&d.observe(Some(click()), t)) > 0 {
                fire_times.push(t);
            }
        }
        assert_eq!(fire_times, vec![0.25, 1.25, 2.25]);
    }

    #[test]
    fn once_per_hold_waits_for_release() {
        let mut d = GestureDebouncer::default();
        let mut g = click();
        g.refire = RefirePolicy::OncePerHold;
        let mut total = 0;
        for k in 0..=48 {
            total += fired(&d.observe(Some(g.clone()), k as f64 * DT));
        }
        assert_eq!(total, 1);
    }

    #[test]
    fn flicker_restores_previous_stable() {
        let mut d = GestureDebouncer::default();
        let point = gesture("POINT", ActionKind::MoveCursor, 0.0, 0.0);
        d.observe(Some(point.clone()), 0.0);
        assert_eq!(d.stable_action(), ActionKind::MoveCursor);

        // un frame suelto de click no debe desplazar al puntero
        d.observe(Some(click()), DT);
        assert_eq!(d.stable_action(), ActionKind::MoveCursor);
        assert_eq!(d.state_name(), "CANDIDATE");
        d.observe(Some(point), 2.0 * DT);
        assert_eq!(d.state_name(), "STABLE");
        assert_eq!(d.stable().map(|g| g.id.as_str()), Some("POINT"));
    }

    #[test]
    fn changed_candidate_restarts_timer() {
        let mut d = GestureDebouncer::default();
        let other = gesture("GUN", ActionKind::DoubleClick, 0.25, 1.0);
        d.observe(Some(click()), 0.0);
        d.observe(Some(click()), 3.0 * DT);
        d.observe(Some(other.clone()), 4.0 * DT);
        assert_eq!(d.pending().flatten().map(|id| id.as_str()), Some("GUN"));
        // 0.25 desde el inicio de GUN, no desde el de PINCH
        assert_eq!(fired(&d.observe(Some(other.clone()), 7.0 * DT)), 0);
        assert_eq!(fired(&d.observe(Some(other), 8.0 * DT)), 1);
    }

    #[test]
    fn neutral_needs_its_own_stability() {
        let mut d = GestureDebouncer::default();
        let scroll = gesture("SCROLL_UP", ActionKind::ScrollUp, 0.0, 0.0);
        d.observe(Some(scroll.clone()), 0.0);
        let events = d.observe(None, DT);
        assert_eq!(fired(&events), 0);
        assert!(!d.is_neutral());
        let events = d.observe(None, 3.0 * DT);
        assert!(events.contains(&DebounceEvent::BecameNeutral));
        assert!(d.is_neutral());
    }

    #[test]
    fn drag_fires_once_and_releases() {
        let mut d = GestureDebouncer::default();
        let drag = gesture("DRAG", ActionKind::Drag, 0.0, 0.0);
        assert_eq!(fired(&d.observe(Some(drag.clone()), 0.0)), 1);
        for k in 1..10 {
            assert_eq!(fired(&d.observe(Some(drag.clone()), k as f64 * DT)), 0);
        }
        let point = gesture("POINT", ActionKind::MoveCursor, 0.0, 0.0);
        let events = d.observe(Some(point), 10.0 * DT);
        assert_eq!(
            events[0],
            DebounceEvent::Released {
                gesture: GestureId::new("DRAG"),
                action: ActionKind::Drag
            }
        );
    }

    #[test]
    fn missing_hand_respects_grace() {
        let mut d = GestureDebouncer::default();
        let drag = gesture("DRAG", ActionKind::Drag, 0.0, 0.0);
        d.observe(Some(drag), 0.0);
        assert!(d.observe_missing(DT).is_empty());
        assert_eq!(d.stable_action(), ActionKind::Drag);

        let events = d.observe_missing(0.25);
        assert!(matches!(events[0], DebounceEvent::Released { .. }));
        assert_eq!(events[1], DebounceEvent::BecameNeutral);
        assert!(d.is_neutral());
        assert!(d.observe_missing(1.0).is_empty());
    }

    #[test]
    fn failure_latch_blocks_until_pose_changes() {
        let mut d = GestureDebouncer::default();
        let scroll = gesture("SCROLL_UP", ActionKind::ScrollUp, 0.0, 0.0);
        d.observe(Some(scroll.clone()), 0.0);
        let events = d.latch_failure();
        assert_eq!(events, vec![DebounceEvent::BecameNeutral]);

        for k in 1..5 {
            assert!(d.observe(Some(scroll.clone()), k as f64 * DT).is_empty());
            assert!(d.is_neutral());
        }
        d.observe(None, 5.0 * DT);
        assert_eq!(fired(&d.observe(Some(scroll), 6.0 * DT)), 1);
    }

    #[test]
    fn failure_during_candidate_latches_the_stable_gesture() {
        let mut d = GestureDebouncer::default();
        let point = gesture("POINT", ActionKind::MoveCursor, 0.0, 0.0);
        d.observe(Some(point.clone()), 0.0);
        d.observe(Some(click()), DT);
        assert_eq!(d.pending(), Some(Some(&GestureId::new("PINCH"))));

        d.latch_failure();
        assert!(d.is_neutral());
        // el cursor que falló sigue bloqueado
        assert!(d.observe(Some(point), 2.0 * DT).is_empty());
        assert!(d.is_neutral());
        // la pinza pendiente no
        d.observe(Some(click()), 3.0 * DT);
        assert_eq!(d.pending(), Some(Some(&GestureId::new("PINCH"))));
    }

    #[test]
    fn cooldown_is_per_action_across_gestures() {
        let mut d = GestureDebouncer::default();
        let a = gesture("A", ActionKind::LeftClick, 0.0, 1.0);
        let b = gesture("B", ActionKind::LeftClick, 0.0, 1.0);
        assert_eq!(fired(&d.observe(Some(a), 0.0)), 1);
        assert_eq!(fired(&d.observe(Some(b.clone()), 0.5)), 0);
        assert_eq!(d.stable().map(|g| g.id.as_str()), Some("B"));
        // el disparo pendiente sale en cuanto vence el cooldown
        assert_eq!(fired(&d.observe(Some(b), 1.0)), 1);
    }
}
