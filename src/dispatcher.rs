use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::gesture_debouncer::DebounceEvent;
use crate::hid::{ActionIntent, ActionKind, Rgb, ScrollDirection};
use crate::types::{HandFrame, Landmark, INDEX_TIP, THUMB_TIP};

/// Punto de la mano que guía el cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorAnchor {
    IndexTip,
    /// Punto medio pulgar–índice: el trazo sale de la pinza
    PinchMidpoint,
}

impl CursorAnchor {
    pub fn locate(self, hand: &HandFrame) -> Landmark {
        match self {
            CursorAnchor::IndexTip => hand.landmark(INDEX_TIP),
            CursorAnchor::PinchMidpoint => hand.landmark(THUMB_TIP).midpoint(hand.landmark(INDEX_TIP)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Unidades por evento de scroll (default: 50)
    pub scroll_amount: i32,
    /// Ancla del cursor en modo ratón (default: index_tip)
    pub mouse_anchor: CursorAnchor,
    /// Ancla del cursor en modo dibujo (default: pinch_midpoint)
    pub draw_anchor: CursorAnchor,
    /// Color del pincel (default: magenta)
    pub brush_color: Rgb,
    /// Grosor del pincel en px (default: 15)
    pub brush_width: f32,
    /// Color de la goma, el fondo del lienzo (default: negro)
    pub eraser_color: Rgb,
    /// Grosor de la goma en px (default: 50)
    pub eraser_width: f32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            scroll_amount: 50,
            mouse_anchor: CursorAnchor::IndexTip,
            draw_anchor: CursorAnchor::PinchMidpoint,
            brush_color: Rgb(255, 0, 255),
            brush_width: 15.0,
            eraser_color: Rgb(0, 0, 0),
            eraser_width: 50.0,
        }
    }
}

/// Traduce disparos del anti-rebote y la posición filtrada a intenciones.
/// No toca el sistema: solo produce registros para los colaboradores.
pub struct ActionDispatcher {
    config: DispatchConfig,
    /// Acción del trazo en curso (draw_stroke o erase)
    stroke: Option<ActionKind>,
}

impl ActionDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            stroke: None,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn is_stroking(&self) -> bool {
        self.stroke.is_some()
    }

    /// Intenciones del frame: sueltas primero, luego el cursor, luego los disparos
    pub fn dispatch(
        &mut self,
        events: &[DebounceEvent],
        stable: ActionKind,
        cursor: Option<(f32, f32)>,
    ) -> Vec<ActionIntent> {
        let mut intents = Vec::new();

        for event in events {
            if let DebounceEvent::Released {
                action: ActionKind::Drag,
                ..
            } = event
            {
                intents.push(ActionIntent::DragEnd);
            }
        }

        let stroke_now = match stable {
            ActionKind::DrawStroke | ActionKind::Erase if cursor.is_some() => Some(stable),
            _ => None,
        };
        if self.stroke.is_some() && self.stroke != stroke_now {
            debug!("✏️  Fin de trazo");
            intents.push(ActionIntent::EndStroke);
        }
        self.stroke = stroke_now;

        if let Some((x, y)) = cursor.filter(|_| stable.tracks_cursor()) {
            intents.push(self.tracking_intent(stable, x, y));
        }

        for event in events {
            if let DebounceEvent::Fired { action, .. } = event {
                if let Some(intent) = self.fired_intent(*action) {
                    intents.push(intent);
                }
            }
        }

        intents
    }

    /// Cierra un trazo abierto (cambio de modo, mano perdida, fallo)
    pub fn interrupt(&mut self) -> Option<ActionIntent> {
        self.stroke.take().map(|_| ActionIntent::EndStroke)
    }

    pub fn clear_canvas(&mut self) -> Vec<ActionIntent> {
        let mut intents: Vec<ActionIntent> = self.interrupt().into_iter().collect();
        intents.push(ActionIntent::ClearCanvas);
        intents
    }

    /// Posición que sigue a la mano: cursor, pincel o goma
    fn tracking_intent(&self, stable: ActionKind, x: f32, y: f32) -> ActionIntent {
        match stable {
            ActionKind::DrawStroke => ActionIntent::Stroke {
                x,
                y,
                color: self.config.brush_color,
                width: self.config.brush_width,
            },
            ActionKind::Erase => ActionIntent::Stroke {
                x,
                y,
                color: self.config.eraser_color,
                width: self.config.eraser_width,
            },
            _ => ActionIntent::MoveCursor { x, y },
        }
    }

    fn fired_intent(&self, action: ActionKind) -> Option<ActionIntent> {
        let intent = match action {
            ActionKind::LeftClick => ActionIntent::LeftClick,
            ActionKind::RightClick => ActionIntent::RightClick,
            ActionKind::DoubleClick => ActionIntent::DoubleClick,
            ActionKind::ScrollUp => ActionIntent::Scroll {
                direction: ScrollDirection::Up,
                amount: self.config.scroll_amount,
            },
            ActionKind::ScrollDown => ActionIntent::Scroll {
                direction: ScrollDirection::Down,
                amount: self.config.scroll_amount,
            },
            ActionKind::Stop => ActionIntent::Stop,
            ActionKind::Drag => ActionIntent::DragStart,
            // seguimiento continuo, ya emitido arriba
            ActionKind::MoveCursor | ActionKind::DrawStroke | ActionKind::Erase => return None,
            ActionKind::None => return None,
        };
        Some(intent)
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new(DispatchConfig::default())
    }
}
