//! Phase tracking and repetition counting
//!
//! The machine compares the phase implied by the current frame against
//! the phase stored in the session. Only the policy's rep edge
//! (e.g. down→up for squats) increments the count, and only after a frame
//! has actually been observed in the edge's `from` phase. A phase that was
//! merely anchored on an exercise switch never completes a rep, and a run
//! of identical frames never counts at all. Frames inside the policy's
//! dead zone leave the stored phase untouched.

use std::sync::Arc;

use log::debug;

use crate::angles::AngleVector;
use crate::policy::{Phase, PolicyTable};
use crate::session::SessionState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The effective exercise changed; the phase was re-anchored to the
    /// new policy's entry phase and the frame was not evaluated further.
    Anchored,
    /// Dead zone, or the frame agrees with the stored phase.
    Held,
    /// Phase changed without completing a repetition.
    Transitioned,
    /// Phase changed along the rep edge.
    RepCompleted,
}

/// Result of one [`PhaseMachine::advance`] call.
#[derive(Clone, Debug, PartialEq)]
pub struct Advance {
    /// Canonical effective exercise.
    pub exercise: String,
    pub previous_phase: Phase,
    pub phase: Phase,
    pub rep_count: u32,
    pub outcome: StepOutcome,
}

impl Advance {
    pub fn rep_completed(&self) -> bool {
        self.outcome == StepOutcome::RepCompleted
    }
}

#[derive(Clone, Debug)]
pub struct PhaseMachine {
    policies: Arc<PolicyTable>,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new(PolicyTable::builtin())
    }
}

impl PhaseMachine {
    pub fn new(policies: Arc<PolicyTable>) -> Self {
        Self { policies }
    }

    pub fn policies(&self) -> &Arc<PolicyTable> {
        &self.policies
    }

    /// Caller intent wins over the classifier.
    pub fn effective_exercise(&self, predicted: &str, selected: Option<&str>) -> String {
        self.policies.canonical(selected.unwrap_or(predicted))
    }

    /// Advance `session` by one frame. Never decreases `rep_count`.
    pub fn advance(
        &self,
        session: &mut SessionState,
        angles: &AngleVector,
        predicted_exercise: &str,
        selected_exercise: Option<&str>,
    ) -> Advance {
        let exercise = self.effective_exercise(predicted_exercise, selected_exercise);
        let policy = self.policies.resolve(&exercise);
        let previous_phase = session.current_phase;
        let observed = policy.instantaneous_phase(angles);
        let at_edge_start = observed == Some(policy.rep_edge.from);

        if session.active_exercise.as_deref() != Some(exercise.as_str()) {
            debug!(
                "exercise {:?} -> {}: phase re-anchored {} -> {}",
                session.active_exercise, exercise, previous_phase, policy.entry_phase
            );
            session.active_exercise = Some(exercise.clone());
            session.current_phase = policy.entry_phase;
            session.rep_armed = at_edge_start;
            return Advance {
                exercise,
                previous_phase,
                phase: session.current_phase,
                rep_count: session.rep_count,
                outcome: StepOutcome::Anchored,
            };
        }

        let outcome = match observed {
            Some(next) if next != previous_phase => {
                session.current_phase = next;
                if session.rep_armed && policy.rep_edge.matches(previous_phase, next) {
                    session.rep_count = session.rep_count.saturating_add(1);
                    session.rep_armed = false;
                    StepOutcome::RepCompleted
                } else {
                    StepOutcome::Transitioned
                }
            }
            _ => StepOutcome::Held,
        };
        if at_edge_start {
            session.rep_armed = true;
        }

        if outcome != StepOutcome::Held {
            debug!(
                "{}: {} -> {} (angle {:.1}, reps {})",
                exercise,
                previous_phase,
                session.current_phase,
                policy.primary_angle(angles),
                session.rep_count
            );
        }

        Advance {
            exercise,
            previous_phase,
            phase: session.current_phase,
            rep_count: session.rep_count,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knee(angle: f64) -> AngleVector {
        AngleVector::new([130.0, 130.0, 170.0, 170.0, 150.0, 150.0, angle, angle, 175.0])
    }

    #[test]
    fn first_frame_anchors_to_entry_phase() {
        let m = PhaseMachine::default();
        let mut s = SessionState::default();
        let adv = m.advance(&mut s, &knee(90.0), "push_up", Some("squat"));
        assert_eq!(adv.outcome, StepOutcome::Anchored);
        assert_eq!(s.current_phase, Phase::Up);
        assert_eq!(s.active_exercise.as_deref(), Some("squat"));
    }

    #[test]
    fn squat_cycle_counts_once() {
        let m = PhaseMachine::default();
        let mut s = SessionState::default();
        for a in [175.0, 90.0, 175.0] {
            m.advance(&mut s, &knee(a), "squat", None);
        }
        assert_eq!(s.rep_count, 1);
        assert_eq!(s.current_phase, Phase::Up);
    }

    #[test]
    fn dead_zone_holds() {
        let m = PhaseMachine::default();
        let mut s = SessionState::default();
        m.advance(&mut s, &knee(175.0), "squat", None);
        m.advance(&mut s, &knee(90.0), "squat", None);
        let adv = m.advance(&mut s, &knee(140.0), "squat", None);
        assert_eq!(adv.outcome, StepOutcome::Held);
        assert_eq!(s.current_phase, Phase::Down);
    }

    #[test]
    fn anchored_phase_does_not_arm_the_rep_edge() {
        let m = PhaseMachine::default();
        let mut s = SessionState::default();
        // shoulder press anchors "down" while the arms are already overhead
        let overhead = knee(175.0);
        m.advance(&mut s, &overhead, "shoulder_press", None);
        assert_eq!(s.current_phase, Phase::Down);
        assert!(!s.rep_armed);
        let adv = m.advance(&mut s, &overhead, "shoulder_press", None);
        assert_eq!(adv.outcome, StepOutcome::Transitioned);
        assert_eq!(s.rep_count, 0);
    }

    #[test]
    fn wall_sit_counts_entering_hold() {
        let m = PhaseMachine::default();
        let mut s = SessionState::default();
        m.advance(&mut s, &knee(170.0), "wall_sits", None);
        assert_eq!(s.current_phase, Phase::Rest);
        let adv = m.advance(&mut s, &knee(90.0), "wall_sits", None);
        assert!(adv.rep_completed());
        assert_eq!(s.current_phase, Phase::Hold);
    }
}
