//! Joint-angle primitives
//!
//! The upstream pose collaborator delivers nine degree values per frame.
//! Left and right sides have already been averaged into a primary and an
//! alternate slot, so the two slots of a pair are interchangeable roles
//! rather than independent body sides.

use serde::{Deserialize, Serialize};

use crate::error::QualityError;

/// Number of angle slots per frame.
pub const ANGLE_COUNT: usize = 9;

/// Semantic slot of an angle inside an [`AngleVector`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Shoulder,
    ShoulderAlt,
    Elbow,
    ElbowAlt,
    Hip,
    HipAlt,
    Knee,
    KneeAlt,
    Spine,
}

impl Joint {
    pub const ALL: [Joint; ANGLE_COUNT] = [
        Joint::Shoulder,
        Joint::ShoulderAlt,
        Joint::Elbow,
        Joint::ElbowAlt,
        Joint::Hip,
        Joint::HipAlt,
        Joint::Knee,
        Joint::KneeAlt,
        Joint::Spine,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The other slot of the primary/alternate pair, if the joint has one.
    pub fn partner(self) -> Option<Joint> {
        match self {
            Joint::Shoulder => Some(Joint::ShoulderAlt),
            Joint::ShoulderAlt => Some(Joint::Shoulder),
            Joint::Elbow => Some(Joint::ElbowAlt),
            Joint::ElbowAlt => Some(Joint::Elbow),
            Joint::Hip => Some(Joint::HipAlt),
            Joint::HipAlt => Some(Joint::Hip),
            Joint::Knee => Some(Joint::KneeAlt),
            Joint::KneeAlt => Some(Joint::Knee),
            Joint::Spine => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Joint::Shoulder => "shoulder",
            Joint::ShoulderAlt => "shoulder_alt",
            Joint::Elbow => "elbow",
            Joint::ElbowAlt => "elbow_alt",
            Joint::Hip => "hip",
            Joint::HipAlt => "hip_alt",
            Joint::Knee => "knee",
            Joint::KneeAlt => "knee_alt",
            Joint::Spine => "spine",
        }
    }
}

/// Nine joint angles in degrees, ordered as [`Joint::ALL`].
///
/// Values are conventionally in [0, 180] but nothing here enforces it;
/// out-of-range readings are still carried so the quality gate can judge
/// them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AngleVector([f64; ANGLE_COUNT]);

impl AngleVector {
    #[inline]
    pub fn new(values: [f64; ANGLE_COUNT]) -> Self {
        Self(values)
    }

    /// Build from a slice, checking only the slot count.
    pub fn from_slice(values: &[f64]) -> Result<Self, QualityError> {
        let arr: [f64; ANGLE_COUNT] = values.try_into().map_err(|_| QualityError::Shape {
            expected: ANGLE_COUNT,
            actual: values.len(),
        })?;
        Ok(Self(arr))
    }

    #[inline]
    pub fn get(&self, joint: Joint) -> f64 {
        self.0[joint.index()]
    }

    #[inline]
    pub fn values(&self) -> &[f64; ANGLE_COUNT] {
        &self.0
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Mean of a joint and its partner slot.
    pub fn pair_mean(&self, joint: Joint) -> f64 {
        match joint.partner() {
            Some(p) => (self.get(joint) + self.get(p)) / 2.0,
            None => self.get(joint),
        }
    }

    /// Absolute difference between a joint and its partner slot.
    pub fn pair_asymmetry(&self, joint: Joint) -> f64 {
        match joint.partner() {
            Some(p) => (self.get(joint) - self.get(p)).abs(),
            None => 0.0,
        }
    }
}

impl From<[f64; ANGLE_COUNT]> for AngleVector {
    fn from(values: [f64; ANGLE_COUNT]) -> Self {
        Self(values)
    }
}
