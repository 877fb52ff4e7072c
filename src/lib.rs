//! Gestos de mano → eventos de ratón.
//!
//! Cada frame del detector de landmarks pasa por:
//!
//! ```text
//! HandFrame ─▶ FeatureExtractor ─▶ GestureClassifier ─▶ GestureDebouncer ─┐
//!     │                                                                   ▼
//!     └──▶ CoordinateMapper ─▶ CursorFilter2D ───────────────▶ ActionDispatcher ─▶ Actuator / Canvas
//! ```
//!
//! [`pipeline::Pipeline`] orquesta un paso completo; [`mailbox`] desacopla el
//! detector (productor) del pipeline (consumidor) con semántica "último frame gana".

pub mod config;
pub mod coordinate_mapper;
pub mod csv_loader;
pub mod dispatcher;
pub mod error;
pub mod feature_extractor;
pub mod gesture_classifier;
pub mod gesture_debouncer;
pub mod hid;
pub mod mailbox;
pub mod mouse_filter;
pub mod pipeline;
pub mod synthetic;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{FrameReport, Mode, Pipeline};
