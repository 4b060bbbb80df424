//! Engine configuration
//!
//! Defaults match the values the pipeline was tuned with. A config can be
//! read from JSON (missing fields keep their defaults) or from the
//! process environment.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::features::DEFAULT_RATIO_EPSILON;
use crate::quality::{DEFAULT_MAX_INVISIBLE_JOINTS, DEFAULT_VISIBILITY_THRESHOLD};
use crate::session::DEFAULT_PHASE_THRESHOLD;

pub const DEFAULT_MIN_TRACKING_VISIBILITY: f64 = 0.4;
pub const DEFAULT_QUALITY_VISIBILITY_WEIGHT: f64 = 0.6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Trained model artifact (JSON).
    pub model_path: Option<PathBuf>,
    /// Fail at startup instead of falling back to the mock classifier.
    pub strict_model: bool,
    pub phase_threshold: f64,
    pub visibility_threshold: f64,
    pub max_invisible_joints: usize,
    /// Visibility ratio that must be exceeded before phases are tracked.
    pub min_tracking_visibility: f64,
    pub quality_visibility_weight: f64,
    pub ratio_epsilon: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            strict_model: false,
            phase_threshold: DEFAULT_PHASE_THRESHOLD,
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
            max_invisible_joints: DEFAULT_MAX_INVISIBLE_JOINTS,
            min_tracking_visibility: DEFAULT_MIN_TRACKING_VISIBILITY,
            quality_visibility_weight: DEFAULT_QUALITY_VISIBILITY_WEIGHT,
            ratio_epsilon: DEFAULT_RATIO_EPSILON,
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidConfig {
        field,
        reason: reason.into(),
    }
}

fn unit_interval(field: &'static str, v: f64) -> Result<(), EngineError> {
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(invalid(field, format!("{} is outside [0, 1]", v)))
    }
}

fn parse_env<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, EngineError> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(field, format!("cannot parse {:?}", raw)))
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| invalid("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let json = fs::read_to_string(path.as_ref())
            .map_err(|e| invalid("config", format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Defaults overridden by `MODEL_PATH`, `STRICT_MODEL`,
    /// `PHASE_THRESHOLD` and `VISIBILITY_THRESHOLD`.
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    pub fn from_env_with<F>(lookup: F) -> Result<Self, EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(path) = lookup("MODEL_PATH").filter(|p| !p.trim().is_empty()) {
            config.model_path = Some(PathBuf::from(path.trim()));
        }
        if let Some(v) = lookup("STRICT_MODEL") {
            config.strict_model =
                matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes");
        }
        if let Some(v) = lookup("PHASE_THRESHOLD") {
            config.phase_threshold = parse_env("phase_threshold", &v)?;
        }
        if let Some(v) = lookup("VISIBILITY_THRESHOLD") {
            config.visibility_threshold = parse_env("visibility_threshold", &v)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        unit_interval("phase_threshold", self.phase_threshold)?;
        unit_interval("min_tracking_visibility", self.min_tracking_visibility)?;
        unit_interval("quality_visibility_weight", self.quality_visibility_weight)?;
        if !(self.visibility_threshold.is_finite() && self.visibility_threshold >= 0.0) {
            return Err(invalid(
                "visibility_threshold",
                format!("{} must be a non-negative number of degrees", self.visibility_threshold),
            ));
        }
        if self.max_invisible_joints >= crate::angles::ANGLE_COUNT {
            return Err(invalid(
                "max_invisible_joints",
                "must be smaller than the number of joints",
            ));
        }
        if !(self.ratio_epsilon.is_finite() && self.ratio_epsilon > 0.0) {
            return Err(invalid("ratio_epsilon", "must be positive"));
        }
        Ok(())
    }
}
