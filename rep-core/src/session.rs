//! Per-session tracking state and the store that owns it.
//!
//! Each session id maps to its own mutex so that a predict call can read,
//! advance and write back one session's phase and rep count as a single
//! critical section while calls for other sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::policy::{Phase, PolicyTable};
use crate::request::{PredictionResult, ResetOptions};

/// Default classifier confidence needed for unselected phase tracking.
pub const DEFAULT_PHASE_THRESHOLD: f64 = 0.7;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub current_phase: Phase,
    pub rep_count: u32,
    pub last_prediction: Option<PredictionResult>,
    pub phase_threshold: f64,
    /// Exercise the caller declared, remembered across calls.
    pub selected_exercise: Option<String>,
    /// Exercise whose policy `current_phase` belongs to.
    pub active_exercise: Option<String>,
    /// Set once a frame has been observed in the rep edge's `from` phase
    /// of the active policy; cleared on anchoring and after each rep.
    #[serde(default)]
    pub rep_armed: bool,
    pub frames_seen: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(DEFAULT_PHASE_THRESHOLD)
    }
}

impl SessionState {
    pub fn new(phase_threshold: f64) -> Self {
        Self {
            current_phase: Phase::default(),
            rep_count: 0,
            last_prediction: None,
            phase_threshold,
            selected_exercise: None,
            active_exercise: None,
            rep_armed: false,
            frames_seen: 0,
        }
    }

    /// A fresh session, anchored to the entry phase of `selected_exercise`
    /// when one is given.
    pub fn fresh(
        phase_threshold: f64,
        selected_exercise: Option<&str>,
        policies: &PolicyTable,
    ) -> Self {
        let mut state = Self::new(phase_threshold);
        if let Some(label) = selected_exercise {
            let canonical = policies.canonical(label);
            state.current_phase = policies.resolve(&canonical).entry_phase;
            state.selected_exercise = Some(canonical.clone());
            state.active_exercise = Some(canonical);
        }
        state
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionState>>>>,
    default_phase_threshold: f64,
    policies: Arc<PolicyTable>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_PHASE_THRESHOLD)
    }
}

impl SessionStore {
    pub fn new(default_phase_threshold: f64) -> Self {
        Self::with_policies(default_phase_threshold, PolicyTable::builtin())
    }

    pub fn with_policies(default_phase_threshold: f64, policies: Arc<PolicyTable>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_phase_threshold,
            policies,
        }
    }

    pub fn default_phase_threshold(&self) -> f64 {
        self.default_phase_threshold
    }

    fn handle(&self, session_id: &str) -> Arc<Mutex<SessionState>> {
        if let Some(h) = self.sessions.read().get(session_id) {
            return Arc::clone(h);
        }
        let mut map = self.sessions.write();
        let h = map.entry(session_id.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(SessionState::new(self.default_phase_threshold)))
        });
        Arc::clone(h)
    }

    /// Snapshot of a session, creating it with defaults if needed.
    pub fn get_or_create(&self, session_id: &str) -> SessionState {
        self.handle(session_id).lock().clone()
    }

    /// Snapshot of an existing session.
    pub fn get(&self, session_id: &str) -> Option<SessionState> {
        let h = self.sessions.read().get(session_id).cloned()?;
        let state = h.lock().clone();
        Some(state)
    }

    /// Zero the rep count, clear the last prediction and re-anchor the
    /// phase. Overrides that are not finite are ignored; thresholds are
    /// clamped to [0, 1].
    pub fn reset(&self, session_id: &str, options: &ResetOptions) -> SessionState {
        let threshold = options
            .phase_threshold
            .filter(|t| t.is_finite())
            .map(|t| t.clamp(0.0, 1.0))
            .unwrap_or(self.default_phase_threshold);
        let selected = options
            .selected_exercise
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let h = self.handle(session_id);
        let mut state = h.lock();
        *state = SessionState::fresh(threshold, selected, &self.policies);
        info!(
            "session {} reset (phase={}, exercise={:?})",
            session_id, state.current_phase, state.selected_exercise
        );
        state.clone()
    }

    pub fn remove(&self, session_id: &str) -> Option<SessionState> {
        let h = self.sessions.write().remove(session_id)?;
        let state = h.lock().clone();
        Some(state)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Run `f` while holding the session's lock.
    pub(crate) fn with_session<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut SessionState) -> R,
    ) -> R {
        let h = self.handle(session_id);
        let mut state = h.lock();
        f(&mut state)
    }
}
