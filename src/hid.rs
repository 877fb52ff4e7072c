use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Vocabulario cerrado de acciones abstractas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    MoveCursor,
    LeftClick,
    RightClick,
    DoubleClick,
    ScrollUp,
    ScrollDown,
    Stop,
    DrawStroke,
    Erase,
    Drag,
    None,
}

/// Cómo se dispara una acción mientras su gesto sigue estable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionClass {
    /// Clicks y stop: un disparo, otro solo tras el cooldown
    Discrete,
    /// Scroll, movimiento, trazo: se repite cada frame pasado el cooldown
    Continuous,
    /// Drag: se dispara al estabilizarse y se suelta al salir del gesto
    Hold,
    Inert,
}

impl ActionKind {
    pub fn class(self) -> ActionClass {
        match self {
            ActionKind::LeftClick
            | ActionKind::RightClick
            | ActionKind::DoubleClick
            | ActionKind::Stop => ActionClass::Discrete,
            ActionKind::MoveCursor
            | ActionKind::ScrollUp
            | ActionKind::ScrollDown
            | ActionKind::DrawStroke
            | ActionKind::Erase => ActionClass::Continuous,
            ActionKind::Drag => ActionClass::Hold,
            ActionKind::None => ActionClass::Inert,
        }
    }

    /// Acciones que arrastran el cursor con la posición filtrada cada frame
    pub fn tracks_cursor(self) -> bool {
        matches!(
            self,
            ActionKind::MoveCursor | ActionKind::Drag | ActionKind::DrawStroke | ActionKind::Erase
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::MoveCursor => "move_cursor",
            ActionKind::LeftClick => "left_click",
            ActionKind::RightClick => "right_click",
            ActionKind::DoubleClick => "double_click",
            ActionKind::ScrollUp => "scroll_up",
            ActionKind::ScrollDown => "scroll_down",
            ActionKind::Stop => "stop",
            ActionKind::DrawStroke => "draw_stroke",
            ActionKind::Erase => "erase",
            ActionKind::Drag => "drag",
            ActionKind::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Color RGB del trazo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Registro de intención que consumen los colaboradores externos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionIntent {
    MoveCursor { x: f32, y: f32 },
    LeftClick,
    RightClick,
    DoubleClick,
    Scroll { direction: ScrollDirection, amount: i32 },
    DragStart,
    DragEnd,
    Stop,
    Stroke { x: f32, y: f32, color: Rgb, width: f32 },
    EndStroke,
    ClearCanvas,
}

impl ActionIntent {
    /// Intenciones que van al lienzo y no al actuador de puntero
    pub fn is_canvas(&self) -> bool {
        matches!(
            self,
            ActionIntent::Stroke { .. } | ActionIntent::EndStroke | ActionIntent::ClearCanvas
        )
    }
}

#[derive(Error, Debug)]
pub enum ActuatorError {
    #[error("Safety abort: {0}")]
    SafetyAbort(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("Unsupported intent: {0:?}")]
    Unsupported(ActionIntent),
}

/// Actuador de sistema operativo: mueve el puntero, hace clicks, scroll y drag
pub trait Actuator {
    fn move_cursor(&mut self, x: f32, y: f32) -> Result<(), ActuatorError>;
    fn left_click(&mut self) -> Result<(), ActuatorError>;
    fn right_click(&mut self) -> Result<(), ActuatorError>;
    fn double_click(&mut self) -> Result<(), ActuatorError>;
    fn scroll(&mut self, direction: ScrollDirection, amount: i32) -> Result<(), ActuatorError>;
    fn drag_start(&mut self) -> Result<(), ActuatorError>;
    fn drag_end(&mut self) -> Result<(), ActuatorError>;

    /// Enruta una intención de puntero al método correspondiente
    fn perform(&mut self, intent: &ActionIntent) -> Result<(), ActuatorError> {
        match *intent {
            ActionIntent::MoveCursor { x, y } => self.move_cursor(x, y),
            ActionIntent::LeftClick => self.left_click(),
            ActionIntent::RightClick => self.right_click(),
            ActionIntent::DoubleClick => self.double_click(),
            ActionIntent::Scroll { direction, amount } => self.scroll(direction, amount),
            ActionIntent::DragStart => self.drag_start(),
            ActionIntent::DragEnd => self.drag_end(),
            ActionIntent::Stop => Ok(()),
            ref other => Err(ActuatorError::Unsupported(other.clone())),
        }
    }
}

/// Lienzo de dibujo (solo modo dibujo)
pub trait Canvas {
    fn stroke(&mut self, point: (f32, f32), color: Rgb, width: f32);
    fn clear(&mut self);
    /// Levanta el pincel: el siguiente punto empieza un trazo nuevo
    fn end_stroke(&mut self) {}
}

/// Actuador que solo deja constancia en el log, para ejecutar sin /dev/uinput
#[derive(Debug, Default)]
pub struct LogActuator {
    last_position: Option<(f32, f32)>,
}

impl LogActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_position(&self) -> Option<(f32, f32)> {
        self.last_position
    }
}

impl Actuator for LogActuator {
    fn move_cursor(&mut self, x: f32, y: f32) -> Result<(), ActuatorError> {
        self.last_position = Some((x, y));
        debug!(x, y, "cursor");
        Ok(())
    }

    fn left_click(&mut self) -> Result<(), ActuatorError> {
        info!("🖱️  click izquierdo");
        Ok(())
    }

    fn right_click(&mut self) -> Result<(), ActuatorError> {
        info!("🖱️  click derecho");
        Ok(())
    }

    fn double_click(&mut self) -> Result<(), ActuatorError> {
        info!("🖱️  doble click");
        Ok(())
    }

    fn scroll(&mut self, direction: ScrollDirection, amount: i32) -> Result<(), ActuatorError> {
        info!(?direction, amount, "scroll");
        Ok(())
    }

    fn drag_start(&mut self) -> Result<(), ActuatorError> {
        info!("✊ drag: botón abajo");
        Ok(())
    }

    fn drag_end(&mut self) -> Result<(), ActuatorError> {
        info!("🖐️  drag: botón arriba");
        Ok(())
    }
}

/// Lienzo que solo registra los trazos en el log
#[derive(Debug, Default)]
pub struct LogCanvas {
    points: usize,
}

impl Canvas for LogCanvas {
    fn stroke(&mut self, point: (f32, f32), color: Rgb, width: f32) {
        self.points += 1;
        debug!(x = point.0, y = point.1, ?color, width, "trazo");
    }

    fn clear(&mut self) {
        info!(points = self.points, "lienzo limpio");
        self.points = 0;
    }

    fn end_stroke(&mut self) {
        debug!("fin de trazo");
    }
}

#[cfg(feature = "uinput")]
pub use self::device::HidOutput;

#[cfg(feature = "uinput")]
mod device {
    use std::time::Duration;

    use uinput::device::Device;
    use uinput::event::controller;
    use uinput::event::relative;

    use super::{Actuator, ActuatorError, ScrollDirection};

    impl From<uinput::Error> for ActuatorError {
        fn from(e: uinput::Error) -> Self {
            ActuatorError::Device(e.to_string())
        }
    }

    /// Actuador real sobre /dev/uinput. El dispositivo es relativo, así que
    /// las posiciones absolutas se convierten en deltas desde la última enviada.
    pub struct HidOutput {
        dev: Device,
        last: Option<(i32, i32)>,
        /// Con el puntero en la esquina superior izquierda se aborta
        failsafe: bool,
    }

    impl HidOutput {
        pub fn new() -> Result<Self, ActuatorError> {
            let dev = uinput::default()?
                .name("handmouse-hid")?
                .event(uinput::event::Controller::Mouse(controller::Mouse::Left))?
                .event(uinput::event::Controller::Mouse(controller::Mouse::Right))?
                .event(uinput::event::Relative::Position(relative::Position::X))?
                .event(uinput::event::Relative::Position(relative::Position::Y))?
                .event(uinput::event::Relative::Wheel(relative::Wheel::Vertical))?
                .create()?;

            Ok(HidOutput {
                dev,
                last: None,
                failsafe: true,
            })
        }

        fn sync(&mut self) -> Result<(), ActuatorError> {
            Ok(self.dev.synchronize()?)
        }

        fn click(&mut self, button: controller::Mouse) -> Result<(), ActuatorError> {
            self.dev.press(&controller::Controller::Mouse(button))?;
            self.sync()?;
            std::thread::sleep(Duration::from_millis(10));
            self.dev.release(&controller::Controller::Mouse(button))?;
            self.sync()
        }
    }

    impl Actuator for HidOutput {
        fn move_cursor(&mut self, x: f32, y: f32) -> Result<(), ActuatorError> {
            let target = (x.round() as i32, y.round() as i32);
            if self.failsafe && target == (0, 0) {
                return Err(ActuatorError::SafetyAbort(
                    "puntero en la esquina (0, 0)".to_string(),
                ));
            }
            let Some((lx, ly)) = self.last.replace(target) else {
                return Ok(());
            };
            let (dx, dy) = (target.0 - lx, target.1 - ly);
            if dx == 0 && dy == 0 {
                return Ok(());
            }
            self.dev.send(relative::Position::X, dx)?;
            self.dev.send(relative::Position::Y, dy)?;
            self.sync()
        }

        fn left_click(&mut self) -> Result<(), ActuatorError> {
            self.click(controller::Mouse::Left)
        }

        fn right_click(&mut self) -> Result<(), ActuatorError> {
            self.click(controller::Mouse::Right)
        }

        fn double_click(&mut self) -> Result<(), ActuatorError> {
            self.click(controller::Mouse::Left)?;
            std::thread::sleep(Duration::from_millis(30));
            self.click(controller::Mouse::Left)
        }

        fn scroll(&mut self, direction: ScrollDirection, amount: i32) -> Result<(), ActuatorError> {
            // la rueda va en "clics": 50 unidades de scroll por clic
            let clicks = (amount / 50).max(1);
            let value = match direction {
                ScrollDirection::Up => clicks,
                ScrollDirection::Down => -clicks,
            };
            self.dev.send(relative::Wheel::Vertical, value)?;
            self.sync()
        }

        fn drag_start(&mut self) -> Result<(), ActuatorError> {
            self.dev
                .press(&controller::Controller::Mouse(controller::Mouse::Left))?;
            self.sync()
        }

        fn drag_end(&mut self) -> Result<(), ActuatorError> {
            self.dev
                .release(&controller::Controller::Mouse(controller::Mouse::Left))?;
            self.sync()
        }
    }
}
