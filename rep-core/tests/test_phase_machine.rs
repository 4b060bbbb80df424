use rep_core::phase_machine::{PhaseMachine, StepOutcome};
use rep_core::policy::{PhasePolicy, PolicyTable};
use rep_core::{AngleVector, Joint, Phase, SessionState};
use std::sync::Arc;

fn knee(angle: f64) -> AngleVector {
    AngleVector::new([130.0, 130.0, 170.0, 170.0, 150.0, 150.0, angle, angle, 175.0])
}

fn elbow(angle: f64) -> AngleVector {
    AngleVector::new([130.0, 130.0, angle, angle, 150.0, 150.0, 170.0, 170.0, 175.0])
}

fn run(
    machine: &PhaseMachine,
    session: &mut SessionState,
    exercise: &str,
    frames: &[AngleVector],
) {
    for f in frames {
        machine.advance(session, f, exercise, Some(exercise));
    }
}

#[test]
fn test_push_up_cycle() {
    let m = PhaseMachine::default();
    let mut s = SessionState::default();
    let frames = [elbow(170.0), elbow(80.0), elbow(170.0), elbow(80.0), elbow(170.0)];
    run(&m, &mut s, "push_up", &frames);
    assert_eq!(s.rep_count, 2);
}

#[test]
fn test_shoulder_press_starts_down() {
    let m = PhaseMachine::default();
    let mut s = SessionState::default();
    let adv = m.advance(&mut s, &elbow(170.0), "shoulder_press", None);
    assert_eq!(adv.outcome, StepOutcome::Anchored);
    assert_eq!(adv.phase, Phase::Down);

    // arms already overhead: the anchored "down" was never observed
    let adv = m.advance(&mut s, &elbow(170.0), "shoulder_press", None);
    assert_eq!(adv.outcome, StepOutcome::Transitioned);
    assert_eq!(s.rep_count, 0);

    run(&m, &mut s, "shoulder_press", &[elbow(80.0), elbow(170.0)]);
    assert_eq!(s.rep_count, 1);
}

#[test]
fn test_static_pose_never_counts_after_switch() {
    let m = PhaseMachine::default();
    let mut s = SessionState::default();
    let frame = knee(175.0);
    m.advance(&mut s, &frame, "squat", None);
    for exercise in ["shoulder_press", "plank", "push_up", "bicep_curl"] {
        for _ in 0..3 {
            m.advance(&mut s, &frame, exercise, Some(exercise));
        }
        assert_eq!(s.rep_count, 0, "{} counted a static pose", exercise);
    }
}

#[test]
fn test_high_knees_count_on_lift() {
    let m = PhaseMachine::default();
    let mut s = SessionState::default();
    run(&m, &mut s, "high_knees", &[knee(170.0), knee(70.0), knee(170.0), knee(70.0)]);
    assert_eq!(s.rep_count, 2);
    assert_eq!(s.current_phase, Phase::Up);
}

#[test]
fn test_wall_sit_margin_is_a_dead_zone() {
    let m = PhaseMachine::default();
    let mut s = SessionState::default();
    run(&m, &mut s, "wall_sits", &[knee(170.0), knee(90.0)]);
    assert_eq!(s.current_phase, Phase::Hold);

    // just outside the window but within the margin
    let adv = m.advance(&mut s, &knee(113.0), "wall_sits", None);
    assert_eq!(adv.outcome, StepOutcome::Held);

    let adv = m.advance(&mut s, &knee(130.0), "wall_sits", None);
    assert_eq!(adv.outcome, StepOutcome::Transitioned);
    assert_eq!(s.current_phase, Phase::Rest);
    assert_eq!(s.rep_count, 1);
}

#[test]
fn test_unknown_exercise_uses_default_policy() {
    let m = PhaseMachine::default();
    let mut s = SessionState::default();
    let adv = m.advance(&mut s, &elbow(170.0), "plank", None);
    assert_eq!(adv.exercise, "plank");
    assert_eq!(adv.phase, Phase::Down);
    for _ in 0..2 {
        assert!(!m.advance(&mut s, &elbow(170.0), "plank", None).rep_completed());
    }
    assert_eq!(s.rep_count, 0);

    run(&m, &mut s, "plank", &[elbow(80.0), elbow(170.0)]);
    assert_eq!(s.rep_count, 1);
}

#[test]
fn test_selected_overrides_prediction() {
    let m = PhaseMachine::default();
    let mut s = SessionState::default();
    let adv = m.advance(&mut s, &knee(175.0), "push_up", Some("Squats"));
    assert_eq!(adv.exercise, "squat");
    assert_eq!(m.effective_exercise("push_up", None), "push_up");
}

#[test]
fn test_rep_count_saturates() {
    let m = PhaseMachine::default();
    let mut s = SessionState::default();
    m.advance(&mut s, &knee(175.0), "squat", None);
    s.rep_count = u32::MAX;
    m.advance(&mut s, &knee(90.0), "squat", None);
    m.advance(&mut s, &knee(175.0), "squat", None);
    assert_eq!(s.rep_count, u32::MAX);
}

#[test]
fn test_custom_policy_table() {
    let mut table = PolicyTable::new(PhasePolicy::band(
        Joint::Hip,
        160.0,
        120.0,
        Phase::Up,
        Phase::Down,
    ));
    table.insert(
        "glute_bridge",
        PhasePolicy::band(Joint::Hip, 170.0, 130.0, Phase::Up, Phase::Down)
            .with_entry(Phase::Down),
    );
    let m = PhaseMachine::new(Arc::new(table));

    let mut s = SessionState::default();
    let hips = |a: f64| AngleVector::new([130.0, 130.0, 170.0, 170.0, a, a, 170.0, 170.0, 175.0]);
    let frames = [hips(120.0), hips(175.0), hips(120.0), hips(175.0)];
    run(&m, &mut s, "glute_bridge", &frames);
    assert_eq!(s.rep_count, 2);
}
