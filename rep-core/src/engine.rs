//! Prediction orchestration
//!
//! `predict` is the single externally visible operation:
//!
//! 1. quality gate (shape and numeric errors are returned to the caller;
//!    a degenerate pose yields a zero-quality result without consulting
//!    the classifier),
//! 2. feature extraction,
//! 3. classification,
//! 4. quality score and exercise-match computation,
//! 5. phase/rep advance on the session,
//! 6. the result is stored as the session's last prediction.
//!
//! Steps 2–6 run while holding the session's lock, so concurrent calls for
//! one session are serialised and calls for different sessions are not.

use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;

use crate::angles::AngleVector;
use crate::config::EngineConfig;
use crate::error::{EngineError, PredictError, QualityError};
use crate::features::FeatureExtractor;
use crate::model::{classify, load_classifier, Classifier, ModelMode};
use crate::phase_machine::PhaseMachine;
use crate::policy::{PolicyTable, UNKNOWN_EXERCISE};
use crate::quality::{quality_score, GateReport, QualityGate};
use crate::request::{ErrorResponse, PredictRequest, PredictionResult, ResetOptions};
use crate::session::{SessionState, SessionStore};

pub const POOR_POSE_WARNING: &str =
    "Poor pose detection - please ensure you are fully visible in the camera";

/// Body returned by [`PredictionEngine::predict_json`] when a response
/// cannot be encoded.
pub const ENCODE_FAILURE_BODY: &str = r#"{"error":"failed to encode response","kind":"encode"}"#;

/// Snapshot of the engine for health reporting.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineStatus {
    pub model_mode: ModelMode,
    pub available_exercises: Vec<String>,
    pub feature_count: usize,
    pub phase_threshold: f64,
    pub active_sessions: usize,
}

pub struct PredictionEngine {
    config: EngineConfig,
    gate: QualityGate,
    extractor: FeatureExtractor,
    classifier: Box<dyn Classifier>,
    machine: PhaseMachine,
    store: Arc<SessionStore>,
}

impl PredictionEngine {
    /// Build an engine around an already constructed classifier using the
    /// built-in policy table.
    pub fn new(config: EngineConfig, classifier: Box<dyn Classifier>) -> Result<Self, EngineError> {
        Self::with_policies(config, classifier, PolicyTable::builtin())
    }

    /// Build an engine, loading the classifier as `config` describes.
    pub fn from_config(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let classifier = load_classifier(config.model_path.as_deref(), config.strict_model)?;
        Self::new(config, classifier)
    }

    pub fn with_policies(
        config: EngineConfig,
        classifier: Box<dyn Classifier>,
        policies: Arc<PolicyTable>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let extractor = FeatureExtractor::new(config.ratio_epsilon, Arc::clone(&policies));
        if classifier.input_width() != extractor.num_features() {
            return Err(EngineError::DimensionMismatch {
                features: extractor.num_features(),
                model: classifier.input_width(),
            });
        }
        let store = Arc::new(SessionStore::with_policies(
            config.phase_threshold,
            Arc::clone(&policies),
        ));
        info!(
            "prediction engine ready: {:?} model, {} exercises",
            classifier.mode(),
            classifier.labels().len()
        );
        Ok(Self {
            gate: QualityGate::new(config.visibility_threshold, config.max_invisible_joints),
            extractor,
            classifier,
            machine: PhaseMachine::new(policies),
            store,
            config,
        })
    }

    /// Share an externally owned session store.
    pub fn with_store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn model_mode(&self) -> ModelMode {
        self.classifier.mode()
    }

    /// Supported exercise labels, in encoder order.
    pub fn exercises(&self) -> &[String] {
        self.classifier.labels().classes()
    }

    pub fn session(&self, session_id: &str) -> SessionState {
        self.store.get_or_create(session_id)
    }

    pub fn reset(&self, session_id: &str, options: &ResetOptions) -> SessionState {
        self.store.reset(session_id, options)
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            model_mode: self.model_mode(),
            available_exercises: self.exercises().to_vec(),
            feature_count: self.extractor.num_features(),
            phase_threshold: self.store.default_phase_threshold(),
            active_sessions: self.store.len(),
        }
    }

    pub fn predict_request(
        &self,
        session_id: &str,
        request: &PredictRequest,
    ) -> Result<PredictionResult, PredictError> {
        self.predict(session_id, &request.angles(), request.selected())
    }

    /// JSON in, JSON out. Rejections are encoded as [`ErrorResponse`].
    pub fn predict_json(&self, session_id: &str, body: &str) -> String {
        let outcome = serde_json::from_str::<PredictRequest>(body)
            .map_err(PredictError::from)
            .and_then(|req| self.predict_request(session_id, &req));
        let encoded = match outcome {
            Ok(result) => serde_json::to_string(&result),
            Err(e) => serde_json::to_string(&ErrorResponse {
                error: e.to_string(),
                kind: e.kind().to_string(),
            }),
        };
        encoded.unwrap_or_else(|_| ENCODE_FAILURE_BODY.to_string())
    }

    pub fn predict(
        &self,
        session_id: &str,
        angles: &[f64],
        selected_exercise: Option<&str>,
    ) -> Result<PredictionResult, PredictError> {
        let gate = match self.gate.validate(angles) {
            Ok(report) => Ok(report),
            Err(e) if e.is_soft() => Err(e),
            Err(e) => return Err(e.into()),
        };
        let requested = selected_exercise
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| self.machine.policies().canonical(s));

        self.store.with_session(session_id, |session| {
            session.frames_seen += 1;

            let result = match gate {
                Ok(report) => {
                    if let Some(label) = &requested {
                        session.selected_exercise = Some(label.clone());
                    }
                    self.track(session_id, session, &report, requested)
                }
                Err(rejection) => self.low_quality(session, angles, &rejection, requested)?,
            };
            session.last_prediction = Some(result.clone());
            Ok(result)
        })
    }

    fn low_quality(
        &self,
        session: &SessionState,
        angles: &[f64],
        rejection: &QualityError,
        requested: Option<String>,
    ) -> Result<PredictionResult, PredictError> {
        debug!("frame rejected: {}", rejection);
        Ok(PredictionResult {
            exercise: UNKNOWN_EXERCISE.to_string(),
            confidence: 0.0,
            phase: session.current_phase,
            rep_count: session.rep_count,
            joint_angles: AngleVector::from_slice(angles)?,
            exercise_match: false,
            selected_exercise: requested,
            quality_score: 0.0,
            all_class_probabilities: Default::default(),
            model_mode: None,
            rep_completed: false,
            visible_joints: self.gate.visible_joints(angles),
            warning: Some(POOR_POSE_WARNING.to_string()),
        })
    }

    fn track(
        &self,
        session_id: &str,
        session: &mut SessionState,
        report: &GateReport,
        requested: Option<String>,
    ) -> PredictionResult {
        // the remembered selection drives tracking; only the request's own
        // selection is matched against the classifier and echoed
        let selected = session.selected_exercise.clone();
        let features = self.extractor.extract(&report.angles, selected.as_deref());
        let classification = classify(self.classifier.as_ref(), &features);

        let predicted = self.machine.policies().canonical(&classification.label);
        let exercise_match = requested.as_deref().is_some_and(|s| s == predicted);

        let trusted = selected.is_some() || classification.confidence >= session.phase_threshold;
        let visible = report.visibility_ratio > self.config.min_tracking_visibility;
        let advance = if trusted && visible {
            Some(self.machine.advance(
                session,
                &report.angles,
                &classification.label,
                selected.as_deref(),
            ))
        } else {
            debug!(
                "phase held: confidence {:.3}, visibility {:.2}",
                classification.confidence, report.visibility_ratio
            );
            None
        };

        let rep_completed = advance.as_ref().is_some_and(|a| a.rep_completed());
        if let Some(adv) = advance.as_ref().filter(|a| a.rep_completed()) {
            info!(
                "session {}: {} rep completed, count {}",
                session_id, adv.exercise, adv.rep_count
            );
        }

        PredictionResult {
            quality_score: quality_score(
                report.visibility_ratio,
                classification.confidence,
                self.config.quality_visibility_weight,
            ),
            exercise: classification.label,
            confidence: classification.confidence,
            phase: session.current_phase,
            rep_count: session.rep_count,
            joint_angles: report.angles,
            exercise_match,
            selected_exercise: requested,
            all_class_probabilities: classification.distribution,
            model_mode: Some(classification.mode),
            rep_completed,
            visible_joints: report.visible_joints,
            warning: None,
        }
    }
}
