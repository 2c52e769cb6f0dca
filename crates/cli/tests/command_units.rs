use std::fs;
use std::path::PathBuf;

use crash_triage::commands::{
    analyze_command, check_directory, check_triage_inputs, describe_outcome, load_records,
    load_triage_config,
};
use tempfile::tempdir;
use triage_core::model::ExploitabilityTag;
use triage_core::services::{Disposition, SampleOutcome, WatchdogOutcome};

fn outcome(disposition: Option<Disposition>) -> SampleOutcome {
    SampleOutcome {
        sample: PathBuf::from("crashes/id_000001"),
        sha256: None,
        exit_code: Some(0),
        watchdog: Some(WatchdogOutcome::Cancelled),
        exploitability: None,
        disposition,
        crash_address: None,
        score: None,
        parse_error: None,
        error: None,
    }
}

#[test]
fn describes_each_disposition() {
    let mut filed = outcome(Some(Disposition::Filed {
        tag: ExploitabilityTag::Exploitable,
        sample: PathBuf::from("crashes/EXPLOITABLE/id_000001"),
        log: PathBuf::from("crashes/EXPLOITABLE/id_000001.log"),
    }));
    filed.score = Some(39);
    assert_eq!(describe_outcome(&filed), "id_000001: filed as EXPLOITABLE [score 39]");

    assert_eq!(
        describe_outcome(&outcome(Some(Disposition::Deleted))),
        "id_000001: deleted (NOT_AN_EXCEPTION)"
    );
    assert_eq!(
        describe_outcome(&outcome(Some(Disposition::Kept))),
        "id_000001: kept (NOT_AN_EXCEPTION)"
    );
    assert_eq!(
        describe_outcome(&outcome(Some(Disposition::Unclassified { reason: "no tag".into() }))),
        "id_000001: left in place (no tag)"
    );

    let mut failed = outcome(None);
    failed.error = Some("Failed to spawn debugger".into());
    failed.watchdog = Some(WatchdogOutcome::Fired { killed: true });
    assert_eq!(describe_outcome(&failed), "id_000001: failed: Failed to spawn debugger [timed out]");
}

#[test]
fn input_checks() {
    let dir = tempdir().expect("tempdir");
    let target = dir.path().join("viewer.exe");
    fs::write(&target, b"").expect("write");

    assert!(check_directory(dir.path()).is_ok());
    assert!(check_directory(&target).is_err());
    assert!(check_triage_inputs(&target, dir.path()).is_ok());

    let err = check_triage_inputs(&dir.path().join("missing.exe"), dir.path()).unwrap_err();
    assert!(err.to_string().ends_with("does not exist"));
}

#[test]
fn config_defaults_without_a_file() {
    let config = load_triage_config(None).expect("defaults");
    assert_eq!(config.timeout_secs, 10);
    assert!(config.delete_non_exceptions);
}

#[test]
fn load_records_counts_skipped_transcripts() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("junk.log"), "nothing useful").expect("write");
    fs::write(
        dir.path().join("crash.log"),
        include_str!("../../core/tests/fixtures/exploitable_x86.log"),
    )
    .expect("write");

    let (records, skipped) = load_records(dir.path(), false).expect("load");
    assert_eq!(records.len(), 1);
    assert_eq!(skipped, 1);
    assert!(analyze_command(dir.path(), false, true, false, true).is_ok());
}
