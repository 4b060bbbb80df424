//! Runtime core for the rep counter
//!
//! This crate turns a stream of per-frame joint angles into exercise
//! predictions, movement phases and repetition counts:
//!
//! 1. **Quality gate** – rejects malformed frames and flags poses where
//!    too few joints are visible.
//! 2. **Features** – a fixed 88-wide vector built from the nine angles
//!    (raw, normalised, trigonometric, pairwise, statistical,
//!    exercise-specific and biomechanical families).
//! 3. **Classifier** – a trained linear model loaded from a JSON artifact,
//!    or a deterministic mock when none is available.
//! 4. **Phase machine** – per-exercise angle bands drive phase
//!    transitions, and the policy's rep edge increments the count.
//! 5. **Sessions** – independent tracking state per session id, safe to
//!    drive from several threads at once.
//!
//! [`PredictionEngine`] ties the stages together. The `rep-counter-wasm`
//! crate exposes the same engine to the browser.

pub mod angles;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod model;
pub mod phase_machine;
pub mod policy;
pub mod quality;
pub mod request;
pub mod session;

pub use angles::{AngleVector, Joint, ANGLE_COUNT};
pub use config::EngineConfig;
pub use engine::{EngineStatus, PredictionEngine};
pub use error::{EngineError, ModelError, PredictError, QualityError};
pub use features::{FeatureExtractor, FeatureVector, FEATURE_COUNT};
pub use model::{Classifier, LabelEncoder, LinearModel, MockModel, ModelMode};
pub use policy::{Phase, PhasePolicy, PolicyTable};
pub use request::{PredictRequest, PredictionResult, ResetOptions};
pub use session::{SessionState, SessionStore};
