use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::tempdir;
use triage_core::config::{
    load_config, ConfigError, TriageConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SCRIPT,
    DEFAULT_TIMEOUT_SECS,
};

#[test]
fn defaults_match_the_standard_run() {
    let config = TriageConfig::default();
    assert_eq!(config.script, DEFAULT_SCRIPT);
    assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    assert!(config.delete_non_exceptions);

    let supervisor = config.supervisor();
    assert_eq!(supervisor.timeout, Duration::from_secs(10));
    assert_eq!(supervisor.poll_interval, Duration::from_millis(100));
    assert!(config.classifier_policy().delete_non_exceptions);
}

#[test]
fn loads_json_with_partial_fields() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("triage.json");
    fs::write(&path, r#"{ "debugger": "/opt/cdb", "timeout_secs": 3 }"#).expect("write");

    let config = load_config(&path).expect("load json");
    assert_eq!(config.debugger, PathBuf::from("/opt/cdb"));
    assert_eq!(config.timeout_secs, 3);
    assert_eq!(config.script, DEFAULT_SCRIPT);
    assert!(config.delete_non_exceptions);
}

#[test]
fn loads_yaml() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("triage.yml");
    fs::write(
        &path,
        "debugger: /opt/cdb\nscript: \"kv; q\"\npoll_interval_ms: 0\ndelete_non_exceptions: false\n",
    )
    .expect("write");

    let config = load_config(&path).expect("load yaml");
    assert_eq!(config.script, "kv; q");
    assert!(!config.delete_non_exceptions);
    assert!(!config.classifier_policy().delete_non_exceptions);
    // A zero poll interval would spin; it is clamped.
    assert_eq!(config.supervisor().poll_interval, Duration::from_millis(1));
}

#[test]
fn rejects_unknown_extension() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("triage.toml");
    fs::write(&path, "timeout_secs = 3").expect("write");

    let err = load_config(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(ref ext) if ext == "toml"));
}

#[test]
fn reports_parse_and_read_failures() {
    let dir = tempdir().expect("tempdir");
    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ not json").expect("write");
    assert!(matches!(load_config(&broken), Err(ConfigError::Parse { .. })));

    let missing = dir.path().join("missing.yaml");
    let err = load_config(&missing).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("missing.yaml"));
}
