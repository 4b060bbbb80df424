use proptest::prelude::*;

use rep_core::policy::normalize_label;
use rep_core::quality::quality_score;
use rep_core::{
    AngleVector, EngineConfig, FeatureExtractor, MockModel, PredictionEngine, FEATURE_COUNT,
};

fn mock_engine() -> PredictionEngine {
    PredictionEngine::new(EngineConfig::default(), Box::new(MockModel::default())).unwrap()
}

fn angles() -> impl Strategy<Value = [f64; 9]> {
    prop::array::uniform9(-180.0f64..360.0)
}

proptest! {
    #[test]
    fn features_are_total_for_finite_angles(
        a in angles(),
        exercise in prop::option::of("[a-z_]{1,12}"),
    ) {
        let f = FeatureExtractor::default().extract(&AngleVector::new(a), exercise.as_deref());
        prop_assert_eq!(f.len(), FEATURE_COUNT);
        prop_assert!(f.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn rep_count_never_decreases(
        knees in prop::collection::vec(5.0f64..180.0, 1..60),
        exercise in prop::sample::select(
            vec!["squat", "lunge", "wall_sits", "high_knees", "bicep_curl"],
        ),
    ) {
        let engine = mock_engine();
        let mut last = 0;
        let mut completed = 0;
        for knee in &knees {
            let frame = [130.0, 130.0, *knee, *knee, 150.0, 150.0, *knee, *knee, 175.0];
            let r = engine.predict("p", &frame, Some(exercise)).unwrap();
            prop_assert!(r.rep_count >= last);
            prop_assert!(r.rep_count - last <= 1);
            prop_assert!((0.0..=1.0).contains(&r.quality_score));
            if r.rep_completed {
                completed += 1;
            }
            last = r.rep_count;
        }
        prop_assert_eq!(last, completed);
        // the first frame only anchors, and each rep needs two transitions
        prop_assert!(last as usize <= knees.len() / 2);
    }

    #[test]
    fn degenerate_frames_never_advance(
        hidden in prop::sample::subsequence((0..9).collect::<Vec<usize>>(), 7..=9),
        low in prop::array::uniform9(-4.9f64..4.9),
    ) {
        let engine = mock_engine();
        let standing = [130.0, 130.0, 170.0, 170.0, 150.0, 150.0, 175.0, 175.0, 175.0];
        engine.predict("p", &standing, Some("squat")).unwrap();
        let before = engine.session("p");

        let mut frame = standing;
        for &i in &hidden {
            frame[i] = low[i];
        }
        let r = engine.predict("p", &frame, Some("squat")).unwrap();
        prop_assert_eq!(r.quality_score, 0.0);
        prop_assert_eq!(r.confidence, 0.0);
        prop_assert_eq!(r.phase, before.current_phase);
        prop_assert_eq!(r.rep_count, before.rep_count);
    }

    #[test]
    fn quality_score_is_bounded(v in 0.0f64..=1.0, c in 0.0f64..=1.0, w in -1.0f64..2.0) {
        let q = quality_score(v, c, w);
        prop_assert!((0.0..=1.0).contains(&q));
    }

    #[test]
    fn label_normalisation_is_idempotent(label in "[A-Za-z _-]{0,20}") {
        let once = normalize_label(&label);
        prop_assert_eq!(normalize_label(&once), once.clone());
        prop_assert!(!once.contains(' ') && !once.contains('-'));
    }
}
