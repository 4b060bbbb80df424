//! Exercise classifier adapter
//!
//! The trained model is an opaque capability: a function from a feature
//! vector to a probability distribution over exercise labels. Two
//! implementations exist behind [`Classifier`]:
//!
//! * [`LinearModel`] – a standardised multinomial logistic model loaded
//!   from a JSON artifact `{ labels, scaler: { mean, scale }, weights, bias }`.
//! * [`MockModel`] – used when no artifact is available. Its distribution
//!   is pseudo-random but deterministic per feature vector, and every
//!   result it produces is tagged [`ModelMode::Mock`].
//!
//! Neither implementation touches session state.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::warn;
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ModelError};
use crate::features::{FeatureVector, FEATURE_COUNT};

/// Labels used by the mock model, in encoder order.
pub const EXERCISE_CATALOG: [&str; 22] = [
    "squat",
    "push_up",
    "bicep_curl",
    "shoulder_press",
    "deadlift",
    "lunge",
    "plank",
    "jumping_jack",
    "tricep_dip",
    "pull_up",
    "bench_press",
    "lat_pulldown",
    "t_bar_row",
    "leg_extension",
    "hip_thrust",
    "leg_raises",
    "russian_twist",
    "chest_fly_machine",
    "high_knees",
    "butt_kicks",
    "wall_sits",
    "burpees",
];

/// Where a distribution came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelMode {
    Trained,
    Mock,
}

/// Fixed index → label mapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Result<Self, ModelError> {
        if classes.is_empty() {
            return Err(ModelError::EmptyLabels);
        }
        Ok(Self { classes })
    }

    pub fn catalog() -> Self {
        Self {
            classes: EXERCISE_CATALOG.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn inverse_transform(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn transform(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == label)
    }
}

/// Opaque feature → distribution function.
pub trait Classifier: Send + Sync {
    /// Number of features the model was built for.
    fn input_width(&self) -> usize;

    fn labels(&self) -> &LabelEncoder;

    fn mode(&self) -> ModelMode;

    /// Probabilities aligned with [`Classifier::labels`], summing to 1.
    fn predict_proba(&self, features: &FeatureVector) -> Vec<f64>;
}

/// Arg-max label with its confidence and the full distribution.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub label: String,
    pub confidence: f64,
    pub distribution: BTreeMap<String, f64>,
    pub mode: ModelMode,
}

/// Run the model and map its output onto labels. Ties resolve to the
/// lowest index.
pub fn classify(model: &dyn Classifier, features: &FeatureVector) -> Classification {
    let probs = model.predict_proba(features);
    let labels = model.labels();

    let mut best = 0usize;
    let mut best_p = f64::NEG_INFINITY;
    for (i, &p) in probs.iter().enumerate() {
        if p > best_p {
            best = i;
            best_p = p;
        }
    }

    let distribution = labels
        .classes()
        .iter()
        .cloned()
        .zip(probs.iter().copied())
        .collect();

    Classification {
        label: labels
            .inverse_transform(best)
            .unwrap_or(crate::policy::UNKNOWN_EXERCISE)
            .to_string(),
        confidence: best_p.clamp(0.0, 1.0),
        distribution,
        mode: model.mode(),
    }
}

/// Numerically stable softmax; uniform for empty or non-finite input.
pub fn softmax(logits: ArrayView1<f64>) -> Vec<f64> {
    let n = logits.len();
    if n == 0 {
        return Vec::new();
    }
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return vec![1.0 / n as f64; n];
    }
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        vec![1.0 / n as f64; n]
    } else {
        exps.iter().map(|e| e / sum).collect()
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct ScalerArtifact {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

#[derive(Debug, Deserialize, Serialize)]
struct LinearArtifact {
    labels: Vec<String>,
    scaler: ScalerArtifact,
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

/// Standardised multinomial logistic model.
#[derive(Clone, Debug)]
pub struct LinearModel {
    labels: LabelEncoder,
    mean: Array1<f64>,
    scale: Array1<f64>,
    /// Shape (n_labels, n_features).
    weights: Array2<f64>,
    bias: Array1<f64>,
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), ModelError> {
    if expected != actual {
        return Err(ModelError::Shape {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_finite<'a>(
    what: &'static str,
    values: impl IntoIterator<Item = &'a f64>,
) -> Result<(), ModelError> {
    if values.into_iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ModelError::NonFinite { what })
    }
}

impl LinearModel {
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let artifact: LinearArtifact = serde_json::from_str(json)?;
        Self::from_artifact(artifact)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    fn from_artifact(a: LinearArtifact) -> Result<Self, ModelError> {
        let labels = LabelEncoder::new(a.labels)?;
        let n_labels = labels.len();
        let n_features = a.scaler.mean.len();

        check_len("scaler.scale", n_features, a.scaler.scale.len())?;
        check_len("weights", n_labels, a.weights.len())?;
        check_len("bias", n_labels, a.bias.len())?;
        for row in &a.weights {
            check_len("weights row", n_features, row.len())?;
        }
        check_finite("scaler.mean", &a.scaler.mean)?;
        check_finite("scaler.scale", &a.scaler.scale)?;
        check_finite("bias", &a.bias)?;
        check_finite("weights", a.weights.iter().flatten())?;

        let flat: Vec<f64> = a.weights.into_iter().flatten().collect();
        let flat_len = flat.len();
        let weights = Array2::from_shape_vec((n_labels, n_features), flat).map_err(|_| {
            ModelError::Shape {
                what: "weights",
                expected: n_labels * n_features,
                actual: flat_len,
            }
        })?;

        // zero-variance features are passed through unscaled
        let scale = Array1::from(a.scaler.scale).mapv(|s| if s.abs() < 1e-12 { 1.0 } else { s });

        Ok(Self {
            labels,
            mean: Array1::from(a.scaler.mean),
            scale,
            weights,
            bias: Array1::from(a.bias),
        })
    }

    /// Raw scores before softmax.
    pub fn logits(&self, features: &FeatureVector) -> Array1<f64> {
        let x = ArrayView1::from(features.as_slice());
        let z = (&x - &self.mean) / &self.scale;
        self.weights.dot(&z) + &self.bias
    }
}

impl Classifier for LinearModel {
    fn input_width(&self) -> usize {
        self.weights.ncols()
    }

    fn labels(&self) -> &LabelEncoder {
        &self.labels
    }

    fn mode(&self) -> ModelMode {
        ModelMode::Trained
    }

    fn predict_proba(&self, features: &FeatureVector) -> Vec<f64> {
        softmax(self.logits(features).view())
    }
}

/// Stand-in used when no trained artifact is available.
#[derive(Clone, Debug)]
pub struct MockModel {
    labels: LabelEncoder,
    input_width: usize,
}

impl Default for MockModel {
    fn default() -> Self {
        Self {
            labels: LabelEncoder::catalog(),
            input_width: FEATURE_COUNT,
        }
    }
}

impl MockModel {
    pub fn new(labels: LabelEncoder, input_width: usize) -> Self {
        Self {
            labels,
            input_width,
        }
    }

    /// FNV-1a over the feature bit patterns.
    fn seed_for(features: &FeatureVector) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for v in features.as_slice() {
            for b in v.to_bits().to_le_bytes() {
                h ^= b as u64;
                h = h.wrapping_mul(0x0100_0000_01b3);
            }
        }
        h
    }
}

impl Classifier for MockModel {
    fn input_width(&self) -> usize {
        self.input_width
    }

    fn labels(&self) -> &LabelEncoder {
        &self.labels
    }

    fn mode(&self) -> ModelMode {
        ModelMode::Mock
    }

    fn predict_proba(&self, features: &FeatureVector) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(Self::seed_for(features));
        // every class in (0.5, 1.5) before normalising
        let raw: Vec<f64> = (0..self.labels.len())
            .map(|_| 0.5 + rng.gen::<f64>())
            .collect();
        let sum: f64 = raw.iter().sum();
        raw.into_iter().map(|r| r / sum).collect()
    }
}

/// Load the trained model, or fall back to [`MockModel`].
///
/// With `strict` set, a missing or invalid artifact is an error instead of
/// a fallback.
pub fn load_classifier(
    path: Option<&Path>,
    strict: bool,
) -> Result<Box<dyn Classifier>, EngineError> {
    let loaded = match path {
        Some(p) => match LinearModel::load(p) {
            Ok(model) => return Ok(Box::new(model)),
            Err(e) => Some(e),
        },
        None => None,
    };

    if strict {
        return Err(match loaded {
            Some(e) => EngineError::Model(e),
            None => EngineError::ModelUnavailable { path: None },
        });
    }

    match (path, loaded) {
        (Some(p), Some(e)) => warn!(
            "model artifact {} unusable ({}); running with mock classifier",
            p.display(),
            e
        ),
        _ => warn!("no model artifact configured; running with mock classifier"),
    }
    Ok(Box::new(MockModel::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn softmax_sums_to_one_and_preserves_order() {
        let p = softmax(array![1.0, 3.0, 2.0].view());
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(p[1] > p[2] && p[2] > p[0]);
    }

    #[test]
    fn softmax_survives_huge_logits() {
        let p = softmax(array![1000.0, 1000.0].view());
        assert!((p[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn encoder_round_trips_index() {
        let enc = LabelEncoder::catalog();
        assert_eq!(enc.len(), 22);
        assert_eq!(enc.transform("bicep_curl"), Some(2));
        assert_eq!(enc.inverse_transform(2), Some("bicep_curl"));
        assert_eq!(enc.inverse_transform(99), None);
    }

    #[test]
    fn empty_encoder_is_rejected() {
        assert!(matches!(LabelEncoder::new(vec![]), Err(ModelError::EmptyLabels)));
    }
}
