use thiserror::Error;

use crate::config::ConfigError;
use crate::gesture_classifier::ClassifierError;
use crate::hid::ActuatorError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gesture table error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Actuator error: {0}")]
    Actuator(#[from] ActuatorError),
}

pub type Result<T> = std::result::Result<T, Error>;
