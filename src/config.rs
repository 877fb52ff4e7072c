//! Superficie de configuración, leída una vez al arrancar desde TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coordinate_mapper::{ActiveRegion, OutputResolution};
use crate::dispatcher::DispatchConfig;
use crate::feature_extractor::ExtractorConfig;
use crate::gesture_classifier::{
    default_draw_rules, default_mouse_rules, ClassifierError, GestureClassifier, GestureRule,
};
use crate::gesture_debouncer::DebounceConfig;
use crate::mouse_filter::CursorFilterConfig;
use crate::pipeline::Mode;
use crate::types::Handedness;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Invalid(String),

    #[error("Rule table {table}: {source}")]
    Rules {
        table: &'static str,
        source: ClassifierError,
    },
}

/// Selección de mano y modo inicial
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Mano preferida cuando el detector entrega varias (default: la de mayor confianza)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_hand: Option<Handedness>,
    /// Modo al arrancar (default: mouse)
    pub mode: Mode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub extractor: ExtractorConfig,
    pub region: ActiveRegion,
    pub output: OutputResolution,
    pub filter: CursorFilterConfig,
    pub debounce: DebounceConfig,
    pub dispatch: DispatchConfig,
    /// Tabla de gestos del modo ratón
    pub rules: Vec<GestureRule>,
    /// Tabla de gestos del modo dibujo
    pub draw_rules: Vec<GestureRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            extractor: ExtractorConfig::default(),
            region: ActiveRegion::default(),
            output: OutputResolution::default(),
            filter: CursorFilterConfig::default(),
            debounce: DebounceConfig::default(),
            dispatch: DispatchConfig::default(),
            rules: default_mouse_rules(),
            draw_rules: default_draw_rules(),
        }
    }
}

fn invalid(msg: String) -> ConfigError {
    ConfigError::Invalid(msg)
}

fn check_duration(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(format!("{name} must be a non-negative duration, got {value}")));
    }
    Ok(())
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parsea y valida; las secciones ausentes quedan con sus valores por defecto
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.region.is_valid() {
            return Err(invalid(format!(
                "padding must be in [0, 0.5), got x={} y={}",
                self.region.padding_x, self.region.padding_y
            )));
        }
        if self.output.width == 0 || self.output.height == 0 {
            return Err(invalid(format!(
                "output resolution must be positive, got {}x{}",
                self.output.width, self.output.height
            )));
        }
        if !self.filter.is_valid() {
            return Err(invalid(format!(
                "filter cutoffs must be positive and speed_coefficient non-negative, got {:?}",
                self.filter
            )));
        }
        check_duration("neutral_stability", self.debounce.neutral_stability)?;
        check_duration("missing_grace", self.debounce.missing_grace)?;

        let e = &self.extractor;
        if !(0.0..=1.0).contains(&e.min_confidence) || !(0.0..=1.0).contains(&e.min_landmark_confidence) {
            return Err(invalid(format!(
                "confidence floors must be in [0, 1], got {} / {}",
                e.min_confidence, e.min_landmark_confidence
            )));
        }
        if !(e.finger_extension_ratio > 0.0 && e.thumb_extension_ratio > 0.0 && e.min_palm_size > 0.0) {
            return Err(invalid(
                "extension ratios and min_palm_size must be positive".to_string(),
            ));
        }

        let d = &self.dispatch;
        if d.scroll_amount <= 0 {
            return Err(invalid(format!("scroll_amount must be > 0, got {}", d.scroll_amount)));
        }
        if !(d.brush_width > 0.0 && d.eraser_width > 0.0) {
            return Err(invalid("brush and eraser widths must be positive".to_string()));
        }

        GestureClassifier::new(self.rules.clone())
            .map_err(|source| ConfigError::Rules { table: "rules", source })?;
        GestureClassifier::new(self.draw_rules.clone())
            .map_err(|source| ConfigError::Rules {
                table: "draw_rules",
                source,
            })?;
        Ok(())
    }
}
