use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use rep_core::config::{DEFAULT_MIN_TRACKING_VISIBILITY, DEFAULT_QUALITY_VISIBILITY_WEIGHT};
use rep_core::error::EngineError;
use rep_core::EngineConfig;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_are_valid() {
    let config = EngineConfig::default();
    config.validate().unwrap();
    assert_eq!(config.phase_threshold, 0.7);
    assert_eq!(config.visibility_threshold, 5.0);
    assert_eq!(config.max_invisible_joints, 6);
    assert_eq!(config.min_tracking_visibility, DEFAULT_MIN_TRACKING_VISIBILITY);
    assert_eq!(config.quality_visibility_weight, DEFAULT_QUALITY_VISIBILITY_WEIGHT);
    assert!(config.model_path.is_none());
    assert!(!config.strict_model);
}

#[test]
fn partial_json_keeps_defaults() {
    let json = r#"{"phase_threshold": 0.5, "strict_model": true}"#;
    let config = EngineConfig::from_json_str(json).unwrap();
    assert_eq!(config.phase_threshold, 0.5);
    assert!(config.strict_model);
    assert_eq!(config.visibility_threshold, 5.0);
}

#[test]
fn out_of_range_values_are_rejected() {
    for json in [
        r#"{"phase_threshold": -0.1}"#,
        r#"{"min_tracking_visibility": 2}"#,
        r#"{"visibility_threshold": -1}"#,
        r#"{"max_invisible_joints": 9}"#,
        r#"{"ratio_epsilon": 0}"#,
    ] {
        assert!(
            matches!(EngineConfig::from_json_str(json), Err(EngineError::InvalidConfig { .. })),
            "accepted {}",
            json
        );
    }
}

#[test]
fn unreadable_json_is_a_config_error() {
    match EngineConfig::from_json_str("{") {
        Err(EngineError::InvalidConfig { field, .. }) => assert_eq!(field, "config"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn environment_overrides_defaults() {
    let config = EngineConfig::from_env_with(env(&[
        ("MODEL_PATH", " /models/exercise.json "),
        ("STRICT_MODEL", "Yes"),
        ("PHASE_THRESHOLD", "0.55"),
        ("VISIBILITY_THRESHOLD", "7.5"),
    ]))
    .unwrap();
    assert_eq!(config.model_path, Some(PathBuf::from("/models/exercise.json")));
    assert!(config.strict_model);
    assert_eq!(config.phase_threshold, 0.55);
    assert_eq!(config.visibility_threshold, 7.5);
}

#[test]
fn empty_environment_is_the_default() {
    let config = EngineConfig::from_env_with(env(&[("MODEL_PATH", "  ")])).unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn unparsable_environment_values_name_the_field() {
    match EngineConfig::from_env_with(env(&[("PHASE_THRESHOLD", "high")])) {
        Err(EngineError::InvalidConfig { field, .. }) => assert_eq!(field, "phase_threshold"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(EngineConfig::from_env_with(env(&[("PHASE_THRESHOLD", "1.2")])).is_err());
}

#[test]
fn config_file_round_trip() {
    let config = EngineConfig {
        phase_threshold: 0.65,
        model_path: Some(PathBuf::from("model.json")),
        ..EngineConfig::default()
    };
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", serde_json::to_string(&config).unwrap()).unwrap();
    assert_eq!(EngineConfig::from_file(file.path()).unwrap(), config);
}

#[test]
fn missing_config_file_is_reported() {
    assert!(matches!(
        EngineConfig::from_file("/nonexistent/rep-config.json"),
        Err(EngineError::InvalidConfig { field: "config", .. })
    ));
}
