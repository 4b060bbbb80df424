//! Joint-angle feature engineering
//!
//! Maps one validated [`AngleVector`] onto the fixed-width vector the
//! exercise classifier consumes. The layout is a set of contiguous
//! families (see [`FeatureFamily`]) so each family can be inspected on
//! its own. Training and inference must agree on this layout; if it
//! changes, [`FEATURE_COUNT`] changes with it and the engine's startup
//! dimension check rejects stale model artifacts.

use std::ops::Range;
use std::sync::Arc;

use crate::angles::{AngleVector, Joint, ANGLE_COUNT};
use crate::policy::PolicyTable;

pub const RAW_WIDTH: usize = ANGLE_COUNT;
pub const NORMALIZED_WIDTH: usize = ANGLE_COUNT;
pub const TRIG_WIDTH: usize = 2 * ANGLE_COUNT;
pub const DIFFERENCE_WIDTH: usize = ANGLE_COUNT - 1;
pub const RATIO_WIDTH: usize = ANGLE_COUNT - 1;
pub const STATS_WIDTH: usize = 5;
pub const EXERCISE_WIDTH: usize = 6;
pub const BIOMECHANICAL_WIDTH: usize = 25;

/// Total width of a [`FeatureVector`].
pub const FEATURE_COUNT: usize = RAW_WIDTH
    + NORMALIZED_WIDTH
    + TRIG_WIDTH
    + DIFFERENCE_WIDTH
    + RATIO_WIDTH
    + STATS_WIDTH
    + EXERCISE_WIDTH
    + BIOMECHANICAL_WIDTH;

/// Floor for ratio denominators, in degrees.
pub const DEFAULT_RATIO_EPSILON: f64 = 1.0;
/// Neutral joint angle used by the deviation and count features.
pub const NEUTRAL_ANGLE: f64 = 90.0;

/// Contiguous feature groups, in layout order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureFamily {
    Raw,
    Normalized,
    Trigonometric,
    Differences,
    Ratios,
    Statistics,
    ExerciseSpecific,
    Biomechanical,
}

impl FeatureFamily {
    pub const ALL: [FeatureFamily; 8] = [
        FeatureFamily::Raw,
        FeatureFamily::Normalized,
        FeatureFamily::Trigonometric,
        FeatureFamily::Differences,
        FeatureFamily::Ratios,
        FeatureFamily::Statistics,
        FeatureFamily::ExerciseSpecific,
        FeatureFamily::Biomechanical,
    ];

    pub fn width(self) -> usize {
        match self {
            FeatureFamily::Raw => RAW_WIDTH,
            FeatureFamily::Normalized => NORMALIZED_WIDTH,
            FeatureFamily::Trigonometric => TRIG_WIDTH,
            FeatureFamily::Differences => DIFFERENCE_WIDTH,
            FeatureFamily::Ratios => RATIO_WIDTH,
            FeatureFamily::Statistics => STATS_WIDTH,
            FeatureFamily::ExerciseSpecific => EXERCISE_WIDTH,
            FeatureFamily::Biomechanical => BIOMECHANICAL_WIDTH,
        }
    }

    /// Index range of this family inside a feature vector.
    pub fn range(self) -> Range<usize> {
        let start: usize = FeatureFamily::ALL
            .iter()
            .take_while(|f| **f != self)
            .map(|f| f.width())
            .sum();
        start..start + self.width()
    }
}

/// Engineered features for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn family(&self, family: FeatureFamily) -> &[f64] {
        &self.0[family.range()]
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }
}

/// Summary statistics of a set of angles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AngleStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
}

/// Population statistics; all zeros for an empty slice.
pub fn angle_stats(values: &[f64]) -> AngleStats {
    if values.is_empty() {
        return AngleStats {
            mean: 0.0,
            std: 0.0,
            min: 0.0,
            max: 0.0,
            range: 0.0,
        };
    }
    let n = values.len() as f64;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values {
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }
    let mean = sum / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    AngleStats {
        mean,
        std: var.sqrt(),
        min,
        max,
        range: (max - min).max(0.0),
    }
}

/// Extractor configuration. Holds the policy table so the
/// exercise-specific block can look up the diagnostic joint of the
/// selected exercise.
#[derive(Clone, Debug)]
pub struct FeatureExtractor {
    pub ratio_epsilon: f64,
    policies: Arc<PolicyTable>,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self {
            ratio_epsilon: DEFAULT_RATIO_EPSILON,
            policies: PolicyTable::builtin(),
        }
    }
}

impl FeatureExtractor {
    pub fn new(ratio_epsilon: f64, policies: Arc<PolicyTable>) -> Self {
        Self {
            ratio_epsilon,
            policies,
        }
    }

    /// Return the number of features per frame.
    pub fn num_features(&self) -> usize {
        FEATURE_COUNT
    }

    /// Compute the feature vector for one frame. Total for any finite
    /// input; `selected_exercise` only affects the exercise-specific block.
    pub fn extract(&self, angles: &AngleVector, selected_exercise: Option<&str>) -> FeatureVector {
        let a = angles.values();
        let mut out = Vec::with_capacity(FEATURE_COUNT);

        // 1. raw
        out.extend_from_slice(a);

        // 2. normalized
        out.extend(a.iter().map(|v| v / 180.0));

        // 3. trigonometric
        out.extend(a.iter().map(|v| v.to_radians().sin()));
        out.extend(a.iter().map(|v| v.to_radians().cos()));

        // 4. adjacent-slot differences; slots (0,1) (2,3) (4,5) (6,7) are
        // the primary/alt pairs
        out.extend(a.windows(2).map(|w| (w[0] - w[1]).abs()));

        // 5. adjacent-slot ratios
        out.extend(a.windows(2).map(|w| w[0] / w[1].max(self.ratio_epsilon)));

        // 6. statistics
        let stats = angle_stats(a);
        out.extend_from_slice(&[stats.mean, stats.std, stats.min, stats.max, stats.range]);

        // 7. exercise-specific
        self.push_exercise_features(&mut out, angles, selected_exercise);

        // 8. biomechanical composites
        push_biomechanical_features(&mut out, angles, &stats);

        debug_assert_eq!(out.len(), FEATURE_COUNT);
        FeatureVector(out)
    }

    fn push_exercise_features(
        &self,
        out: &mut Vec<f64>,
        angles: &AngleVector,
        selected_exercise: Option<&str>,
    ) {
        let Some(exercise) = selected_exercise else {
            out.extend_from_slice(&[0.0; EXERCISE_WIDTH]);
            return;
        };
        let policy = self.policies.resolve(exercise);
        let primary = policy.primary_angle(angles);
        let (upper, lower) = policy.rule.bounds();
        out.extend_from_slice(&[
            primary,
            primary / 180.0,
            primary - upper,
            primary - lower,
            angles.pair_asymmetry(policy.primary),
            if self.policies.contains(exercise) { 1.0 } else { 0.0 },
        ]);
    }
}

fn push_biomechanical_features(out: &mut Vec<f64>, angles: &AngleVector, stats: &AngleStats) {
    let a = angles.values();
    let shoulder = angles.pair_mean(Joint::Shoulder);
    let elbow = angles.pair_mean(Joint::Elbow);
    let hip = angles.pair_mean(Joint::Hip);
    let knee = angles.pair_mean(Joint::Knee);
    let spine = angles.get(Joint::Spine);
    let segments = angle_stats(&[shoulder, elbow, hip, knee]);

    // segment averages and asymmetries
    out.extend_from_slice(&[
        shoulder,
        elbow,
        angles.pair_asymmetry(Joint::Shoulder),
        angles.pair_asymmetry(Joint::Elbow),
        hip,
        knee,
        angles.pair_asymmetry(Joint::Hip),
        angles.pair_asymmetry(Joint::Knee),
        spine,
        shoulder + elbow,
        hip + knee,
        (shoulder - hip).abs(),
        stats.mean * a.len() as f64,
        segments.std,
    ]);

    // deviation from neutral
    for joint in [Joint::Shoulder, Joint::Elbow, Joint::Hip, Joint::Knee] {
        out.push((angles.get(joint) - NEUTRAL_ANGLE).abs());
    }

    out.extend_from_slice(&[
        count_where(a, |v| v > NEUTRAL_ANGLE),
        count_where(a, |v| v < NEUTRAL_ANGLE),
        count_where(a, |v| (v - NEUTRAL_ANGLE).abs() < 15.0),
        count_where(a, |v| (v - 180.0).abs() < 30.0),
        count_where(a, |v| v.abs() < 30.0),
    ]);

    // torso lean away from upright, and mean relative pair asymmetry
    out.push((180.0 - spine).abs());
    let symmetry_index = [Joint::Shoulder, Joint::Elbow, Joint::Hip, Joint::Knee]
        .iter()
        .map(|&j| angles.pair_asymmetry(j) / angles.pair_mean(j).abs().max(1.0))
        .sum::<f64>()
        / 4.0;
    out.push(symmetry_index);
}

fn count_where(values: &[f64], pred: impl Fn(f64) -> bool) -> f64 {
    values.iter().filter(|v| pred(**v)).count() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_ranges_tile_the_vector() {
        let mut next = 0;
        for family in FeatureFamily::ALL {
            let r = family.range();
            assert_eq!(r.start, next);
            next = r.end;
        }
        assert_eq!(next, FEATURE_COUNT);
    }

    #[test]
    fn stats_of_empty_slice_are_zero() {
        let s = angle_stats(&[]);
        assert_eq!(s.mean, 0.0);
        assert_eq!(s.range, 0.0);
    }
}
