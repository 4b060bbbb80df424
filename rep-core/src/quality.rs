//! Frame quality gate.
//!
//! Every frame passes through here before it may reach the classifier.
//! The gate checks shape, numeric sanity and joint visibility, in that
//! order, and is otherwise side-effect free.

use crate::angles::{AngleVector, ANGLE_COUNT};
use crate::error::QualityError;

/// Degrees under which a joint reading is treated as "not seen".
pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 5.0;
/// More than this many invisible joints makes the pose degenerate.
pub const DEFAULT_MAX_INVISIBLE_JOINTS: usize = 6;

/// Outcome of a successful validation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GateReport {
    pub angles: AngleVector,
    pub visible_joints: usize,
    /// `visible_joints / 9`, in [0, 1].
    pub visibility_ratio: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct QualityGate {
    pub visibility_threshold: f64,
    pub max_invisible_joints: usize,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
            max_invisible_joints: DEFAULT_MAX_INVISIBLE_JOINTS,
        }
    }
}

impl QualityGate {
    pub fn new(visibility_threshold: f64, max_invisible_joints: usize) -> Self {
        Self {
            visibility_threshold,
            max_invisible_joints,
        }
    }

    /// Count the joints whose magnitude is at or above the visibility
    /// threshold. Non-finite values never count as visible.
    pub fn visible_joints(&self, angles: &[f64]) -> usize {
        angles
            .iter()
            .filter(|a| a.is_finite() && a.abs() >= self.visibility_threshold)
            .count()
    }

    pub fn validate(&self, raw: &[f64]) -> Result<GateReport, QualityError> {
        let angles = AngleVector::from_slice(raw)?;

        if let Some((index, &value)) = raw.iter().enumerate().find(|(_, a)| !a.is_finite()) {
            return Err(QualityError::NonNumeric { index, value });
        }

        let visible_joints = self.visible_joints(raw);
        let invisible = ANGLE_COUNT - visible_joints;
        if invisible > self.max_invisible_joints {
            return Err(QualityError::DegeneratePose {
                invisible,
                total: ANGLE_COUNT,
            });
        }

        Ok(GateReport {
            angles,
            visible_joints,
            visibility_ratio: visible_joints as f64 / ANGLE_COUNT as f64,
        })
    }
}

/// Blend joint visibility and classifier confidence into a [0, 1] score.
pub fn quality_score(visibility_ratio: f64, confidence: f64, visibility_weight: f64) -> f64 {
    let w = visibility_weight.clamp(0.0, 1.0);
    (w * visibility_ratio + (1.0 - w) * confidence).clamp(0.0, 1.0)
}
