#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::{tempdir, TempDir};
use triage_core::config::TriageConfig;
use triage_core::corpus::list_samples;
use triage_core::model::ExploitabilityTag;
use triage_core::services::{
    Disposition, ProcessKiller, ProcessSupervisor, SupervisorConfig, TriagePipeline,
    WatchdogOutcome,
};

struct NoopKiller;

impl ProcessKiller for NoopKiller {
    fn kill_first_named(&self, _name: &str) -> bool {
        false
    }
}

/// A stand-in debugger that prints the fixture transcript named after the
/// sample (argument 5), or nothing if there is none.
fn fake_debugger(dir: &Path) -> PathBuf {
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures");
    let script = dir.join("fake-cdb.sh");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\nfixture=\"{}/$(basename \"$5\").log\"\n[ -f \"$fixture\" ] && cat \"$fixture\"\nexit 0\n",
            fixtures.display()
        ),
    )
    .expect("write fake debugger");
    let mut perms = fs::metadata(&script).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&script, perms).expect("chmod");
    script
}

fn pipeline(tools: &TempDir, corpus: &Path, delete_non_exceptions: bool) -> TriagePipeline<NoopKiller> {
    let config = TriageConfig {
        debugger: fake_debugger(tools.path()),
        delete_non_exceptions,
        ..TriageConfig::default()
    };
    let supervisor = ProcessSupervisor::with_killer(
        SupervisorConfig { timeout: Duration::from_secs(10), poll_interval: Duration::from_millis(20) },
        NoopKiller,
    );
    TriagePipeline::with_supervisor(&config, "viewer.exe", corpus, supervisor)
}

fn seed(corpus: &Path, names: &[&str]) {
    for name in names {
        fs::write(corpus.join(name), name.as_bytes()).expect("write sample");
    }
}

#[test]
fn triages_a_mixed_corpus() {
    let tools = tempdir().expect("tools");
    let corpus = tempdir().expect("corpus");
    seed(corpus.path(), &["exploitable_x86", "not_an_exception", "probably_not_x64", "silent"]);

    let samples = list_samples(corpus.path()).expect("list");
    let summary = pipeline(&tools, corpus.path(), true).run(&samples);

    assert_eq!(summary.outcomes.len(), 4);
    let counts = summary.counts();
    assert_eq!(counts.filed, 2);
    assert_eq!(counts.deleted, 1);
    assert_eq!(counts.unclassified, 1);
    assert_eq!(counts.failed, 0);
    assert_eq!(counts.timed_out, 0);

    let root = corpus.path();
    assert!(root.join("EXPLOITABLE").join("exploitable_x86").is_file());
    assert!(root.join("EXPLOITABLE").join("exploitable_x86.log").is_file());
    assert!(root.join("PROBABLY_NOT_EXPLOITABLE").join("probably_not_x64").is_file());
    assert!(!root.join("not_an_exception").exists());
    assert!(!root.join("NOT_AN_EXCEPTION").exists());
    assert!(root.join("silent").is_file());
}

#[test]
fn outcome_carries_parse_and_score_details() {
    let tools = tempdir().expect("tools");
    let corpus = tempdir().expect("corpus");
    seed(corpus.path(), &["exploitable_x86", "not_an_exception"]);

    let pipeline = pipeline(&tools, corpus.path(), true);
    let exploitable = pipeline.triage_sample(&corpus.path().join("exploitable_x86"));

    assert_eq!(exploitable.exploitability, Some(ExploitabilityTag::Exploitable));
    assert_eq!(exploitable.crash_address.as_deref(), Some("41414141"));
    assert_eq!(exploitable.score, Some(39));
    assert_eq!(exploitable.exit_code, Some(0));
    assert_eq!(exploitable.watchdog, Some(WatchdogOutcome::Cancelled));
    assert_eq!(exploitable.sha256.as_deref().map(str::len), Some(64));
    assert!(exploitable.parse_error.is_none());
    assert!(exploitable.error.is_none());

    let benign = pipeline.triage_sample(&corpus.path().join("not_an_exception"));
    assert_eq!(benign.exploitability, Some(ExploitabilityTag::NotAnException));
    assert_eq!(benign.disposition, Some(Disposition::Deleted));
    assert!(benign.parse_error.is_some());
    assert!(benign.score.is_none());
}

#[test]
fn non_exceptions_survive_when_deletion_disabled() {
    let tools = tempdir().expect("tools");
    let corpus = tempdir().expect("corpus");
    seed(corpus.path(), &["not_an_exception"]);

    let outcome = pipeline(&tools, corpus.path(), false)
        .triage_sample(&corpus.path().join("not_an_exception"));

    assert_eq!(outcome.disposition, Some(Disposition::Kept));
    assert!(corpus.path().join("not_an_exception").is_file());
}

#[test]
fn missing_debugger_fails_the_sample_but_not_the_batch() {
    let corpus = tempdir().expect("corpus");
    seed(corpus.path(), &["a", "b"]);

    let config = TriageConfig {
        debugger: PathBuf::from("/definitely/not/cdb.exe"),
        ..TriageConfig::default()
    };
    let supervisor = ProcessSupervisor::with_killer(config.supervisor(), NoopKiller);
    let pipeline = TriagePipeline::with_supervisor(&config, "viewer.exe", corpus.path(), supervisor);

    let summary = pipeline.run(&list_samples(corpus.path()).expect("list"));
    assert_eq!(summary.counts().failed, 2);
    assert!(summary.outcomes.iter().all(|o| o.error.is_some()));
    assert!(corpus.path().join("a").is_file());
}

#[test]
fn summary_serializes_to_json() {
    let tools = tempdir().expect("tools");
    let corpus = tempdir().expect("corpus");
    seed(corpus.path(), &["probably_not_x64"]);

    let summary = pipeline(&tools, corpus.path(), true)
        .run(&list_samples(corpus.path()).expect("list"));
    let json = serde_json::to_value(&summary).expect("json");

    let outcome = &json["outcomes"][0];
    assert_eq!(outcome["exploitability"], "PROBABLY_NOT_EXPLOITABLE");
    assert_eq!(outcome["disposition"]["action"], "filed");
    assert_eq!(outcome["watchdog"], "cancelled");
    assert_eq!(outcome["score"], 2);
    assert!(outcome.get("parse_error").is_none());
    assert!(json["started_at"].is_string());
}
