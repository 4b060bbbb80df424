//! Wire types exchanged with the HTTP layer and the browser UI.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::angles::AngleVector;
use crate::model::ModelMode;
use crate::policy::Phase;

/// One joint-angle entry as it arrives on the wire.
///
/// Numeric strings are accepted; anything else becomes NaN so the quality
/// gate reports it as non-numeric instead of the request failing to parse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAngle {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl RawAngle {
    pub fn to_degrees(&self) -> f64 {
        match self {
            RawAngle::Number(v) => *v,
            RawAngle::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
            RawAngle::Other(_) => f64::NAN,
        }
    }
}

impl From<f64> for RawAngle {
    fn from(v: f64) -> Self {
        RawAngle::Number(v)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub joint_angles: Vec<RawAngle>,
    #[serde(default)]
    pub selected_exercise: Option<String>,
}

impl PredictRequest {
    pub fn new(angles: &[f64], selected_exercise: Option<&str>) -> Self {
        Self {
            joint_angles: angles.iter().copied().map(RawAngle::from).collect(),
            selected_exercise: selected_exercise.map(str::to_string),
        }
    }

    pub fn angles(&self) -> Vec<f64> {
        self.joint_angles.iter().map(RawAngle::to_degrees).collect()
    }

    /// The selected exercise, with blank strings treated as absent.
    pub fn selected(&self) -> Option<&str> {
        self.selected_exercise
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResetOptions {
    #[serde(default)]
    pub phase_threshold: Option<f64>,
    #[serde(default)]
    pub selected_exercise: Option<String>,
}

/// Outcome of one predict call. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub exercise: String,
    pub confidence: f64,
    pub phase: Phase,
    pub rep_count: u32,
    pub joint_angles: AngleVector,
    pub exercise_match: bool,
    pub selected_exercise: Option<String>,
    pub quality_score: f64,
    #[serde(rename = "all_predictions")]
    pub all_class_probabilities: BTreeMap<String, f64>,
    /// `None` when the classifier was not consulted.
    pub model_mode: Option<ModelMode>,
    pub rep_completed: bool,
    pub visible_joints: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Structured body for rejected calls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}
