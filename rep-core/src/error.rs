//! Error types for the rep-counting pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Rejection reasons produced by the quality gate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QualityError {
    /// The frame does not carry exactly the expected number of angles.
    #[error("expected {expected} joint angles, got {actual}")]
    Shape { expected: usize, actual: usize },

    /// An angle is NaN, infinite, or was not a number at all.
    #[error("joint angle at index {index} is not a finite number ({value})")]
    NonNumeric { index: usize, value: f64 },

    /// Too many joints are below the visibility threshold.
    #[error("degenerate pose: {invisible} of {total} joints not visible")]
    DegeneratePose { invisible: usize, total: usize },
}

impl QualityError {
    /// Soft rejections still yield a (low quality) prediction result.
    pub fn is_soft(&self) -> bool {
        matches!(self, QualityError::DegeneratePose { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QualityError::Shape { .. } => "shape",
            QualityError::NonNumeric { .. } => "non_numeric",
            QualityError::DegeneratePose { .. } => "degenerate_pose",
        }
    }
}

/// Failures while loading or validating a classifier artifact.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("model {what} has length {actual}, expected {expected}")]
    Shape {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("model artifact has no labels")]
    EmptyLabels,

    #[error("model {what} contains non-finite values")]
    NonFinite { what: &'static str },
}

/// Startup-time configuration errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("model artifact unavailable at {path:?} and strict mode is enabled")]
    ModelUnavailable { path: Option<PathBuf> },

    #[error("feature extractor produces {features} features but the model expects {model}")]
    DimensionMismatch { features: usize, model: usize },

    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

/// Per-call errors returned by the prediction engine.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] QualityError),

    #[error("malformed request: {0}")]
    Request(#[from] serde_json::Error),
}

impl PredictError {
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::InvalidInput(e) => e.kind(),
            PredictError::Request(_) => "request",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_pose_is_the_only_soft_error() {
        assert!(QualityError::DegeneratePose { invisible: 7, total: 9 }.is_soft());
        assert!(!QualityError::Shape { expected: 9, actual: 3 }.is_soft());
        assert!(!QualityError::NonNumeric { index: 0, value: f64::NAN }.is_soft());
    }

    #[test]
    fn messages_carry_context() {
        let msg = QualityError::Shape { expected: 9, actual: 4 }.to_string();
        assert!(msg.contains('9') && msg.contains('4'));
        let msg = EngineError::DimensionMismatch { features: 88, model: 81 }.to_string();
        assert!(msg.contains("88") && msg.contains("81"));
    }
}
