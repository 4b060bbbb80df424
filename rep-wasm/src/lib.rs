//! Rep counter for the browser
//!
//! WebAssembly bindings to rep_core. One [`RepCounter`] owns a prediction
//! engine and any number of sessions, keyed by the id the page supplies.

use rep_core::config::{DEFAULT_MIN_TRACKING_VISIBILITY, DEFAULT_QUALITY_VISIBILITY_WEIGHT};
use rep_core::engine::POOR_POSE_WARNING;
use rep_core::error::PredictError;
use rep_core::model::{Classifier, LinearModel, MockModel};
use rep_core::quality::{DEFAULT_MAX_INVISIBLE_JOINTS, DEFAULT_VISIBILITY_THRESHOLD};
use rep_core::request::ErrorResponse;
use rep_core::session::DEFAULT_PHASE_THRESHOLD;
use rep_core::{
    EngineConfig, PredictRequest, PredictionEngine, ResetOptions, ANGLE_COUNT, FEATURE_COUNT,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

fn to_js<T: Serialize>(value: &T) -> JsValue {
    // json_compatible turns maps into plain objects
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .unwrap_or(JsValue::NULL)
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn predict_error(e: PredictError) -> JsValue {
    to_js(&ErrorResponse {
        error: e.to_string(),
        kind: e.kind().to_string(),
    })
}

/// Shared constants exposed to JavaScript
#[wasm_bindgen]
pub fn constants() -> JsValue {
    #[derive(Serialize)]
    struct Constants {
        angle_count: usize,
        feature_count: usize,
        default_phase_threshold: f64,
        default_visibility_threshold: f64,
        default_max_invisible_joints: usize,
        default_min_tracking_visibility: f64,
        default_quality_visibility_weight: f64,
        poor_pose_warning: &'static str,
    }

    to_js(&Constants {
        angle_count: ANGLE_COUNT,
        feature_count: FEATURE_COUNT,
        default_phase_threshold: DEFAULT_PHASE_THRESHOLD,
        default_visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
        default_max_invisible_joints: DEFAULT_MAX_INVISIBLE_JOINTS,
        default_min_tracking_visibility: DEFAULT_MIN_TRACKING_VISIBILITY,
        default_quality_visibility_weight: DEFAULT_QUALITY_VISIBILITY_WEIGHT,
        poor_pose_warning: POOR_POSE_WARNING,
    })
}

#[wasm_bindgen]
pub struct RepCounter {
    engine: PredictionEngine,
}

#[wasm_bindgen]
impl RepCounter {
    /// Both arguments are JSON text. Without a model artifact the counter
    /// runs on the mock classifier.
    #[wasm_bindgen(constructor)]
    pub fn new(
        config_json: Option<String>,
        model_json: Option<String>,
    ) -> Result<RepCounter, JsValue> {
        let config = match config_json.as_deref() {
            Some(json) => EngineConfig::from_json_str(json).map_err(js_error)?,
            None => EngineConfig::default(),
        };
        let classifier: Box<dyn Classifier> = match model_json.as_deref() {
            Some(json) => Box::new(LinearModel::from_json_str(json).map_err(js_error)?),
            None => Box::new(MockModel::default()),
        };
        let engine = PredictionEngine::new(config, classifier).map_err(js_error)?;
        Ok(RepCounter { engine })
    }

    /// `request` is `{ joint_angles, selected_exercise? }`. Rejections are
    /// thrown as `{ error, kind }`.
    pub fn predict(&self, session_id: &str, request: JsValue) -> Result<JsValue, JsValue> {
        let request: PredictRequest = serde_wasm_bindgen::from_value(request).map_err(|e| {
            to_js(&ErrorResponse {
                error: e.to_string(),
                kind: "request".to_string(),
            })
        })?;
        self.engine
            .predict_request(session_id, &request)
            .map(|r| to_js(&r))
            .map_err(predict_error)
    }

    #[wasm_bindgen(js_name = "predictAngles")]
    pub fn predict_angles(
        &self,
        session_id: &str,
        angles: Vec<f64>,
        selected_exercise: Option<String>,
    ) -> Result<JsValue, JsValue> {
        self.engine
            .predict(session_id, &angles, selected_exercise.as_deref())
            .map(|r| to_js(&r))
            .map_err(predict_error)
    }

    /// JSON in, JSON out; never throws.
    #[wasm_bindgen(js_name = "predictJson")]
    pub fn predict_json(&self, session_id: &str, body: &str) -> String {
        self.engine.predict_json(session_id, body)
    }

    /// `options` may be `undefined` or `{ phase_threshold?, selected_exercise? }`.
    pub fn reset(&self, session_id: &str, options: JsValue) -> Result<JsValue, JsValue> {
        let options: ResetOptions = if options.is_undefined() || options.is_null() {
            ResetOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options).map_err(js_error)?
        };
        Ok(to_js(&self.engine.reset(session_id, &options)))
    }

    pub fn session(&self, session_id: &str) -> JsValue {
        to_js(&self.engine.session(session_id))
    }

    #[wasm_bindgen(js_name = "removeSession")]
    pub fn remove_session(&self, session_id: &str) -> bool {
        self.engine.store().remove(session_id).is_some()
    }

    pub fn exercises(&self) -> JsValue {
        to_js(&self.engine.exercises())
    }

    pub fn status(&self) -> JsValue {
        to_js(&self.engine.status())
    }

    #[wasm_bindgen(getter, js_name = "modelMode")]
    pub fn model_mode(&self) -> String {
        let mode = match self.engine.model_mode() {
            rep_core::ModelMode::Trained => "trained",
            rep_core::ModelMode::Mock => "mock",
        };
        mode.to_string()
    }
}
