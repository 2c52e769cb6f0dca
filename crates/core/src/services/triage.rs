use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::analysis::{find_exploitability, parse_transcript, score};
use crate::config::TriageConfig;
use crate::corpus::{sha256_file, CorpusLayout};
use crate::model::ExploitabilityTag;
use crate::services::classifier::{Classifier, Disposition};
use crate::services::supervisor::{
    DebuggerCommand, ProcessKiller, ProcessSupervisor, SystemProcessKiller, WatchdogOutcome,
};

/// Everything learned about one sample during triage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleOutcome {
    pub sample: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watchdog: Option<WatchdogOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exploitability: Option<ExploitabilityTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposition: Option<Disposition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u64>,
    /// Why the transcript could not be turned into a crash record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    /// Supervision or filesystem failure for this sample.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SampleOutcome {
    fn new(sample: &Path) -> Self {
        Self {
            sample: sample.to_path_buf(),
            sha256: None,
            exit_code: None,
            watchdog: None,
            exploitability: None,
            disposition: None,
            crash_address: None,
            score: None,
            parse_error: None,
            error: None,
        }
    }
}

/// Result of triaging a whole corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriageSummary {
    pub target: PathBuf,
    pub corpus: PathBuf,
    pub started_at: String,
    pub finished_at: String,
    pub outcomes: Vec<SampleOutcome>,
}

/// Per-disposition totals for a summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TriageCounts {
    pub filed: usize,
    pub deleted: usize,
    pub kept: usize,
    pub unclassified: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl TriageSummary {
    pub fn counts(&self) -> TriageCounts {
        let mut counts = TriageCounts::default();
        for outcome in &self.outcomes {
            if outcome.watchdog.is_some_and(|w| w.timed_out()) {
                counts.timed_out += 1;
            }
            match &outcome.disposition {
                Some(Disposition::Filed { .. }) => counts.filed += 1,
                Some(Disposition::Deleted) => counts.deleted += 1,
                Some(Disposition::Kept) => counts.kept += 1,
                Some(Disposition::Unclassified { .. }) => counts.unclassified += 1,
                None => counts.failed += 1,
            }
        }
        counts
    }
}

/// Serial triage driver: one sample at a time, debugger run, parse, file.
pub struct TriagePipeline<K: ProcessKiller = SystemProcessKiller> {
    supervisor: ProcessSupervisor<K>,
    classifier: Classifier,
    debugger: PathBuf,
    script: String,
    target: PathBuf,
}

impl TriagePipeline<SystemProcessKiller> {
    pub fn new(config: &TriageConfig, target: impl AsRef<Path>, corpus: impl AsRef<Path>) -> Self {
        Self::with_supervisor(
            config,
            target,
            corpus,
            ProcessSupervisor::new(config.supervisor()),
        )
    }
}

impl<K: ProcessKiller> TriagePipeline<K> {
    pub fn with_supervisor(
        config: &TriageConfig,
        target: impl AsRef<Path>,
        corpus: impl AsRef<Path>,
        supervisor: ProcessSupervisor<K>,
    ) -> Self {
        Self {
            supervisor,
            classifier: Classifier::new(CorpusLayout::new(corpus), config.classifier_policy()),
            debugger: config.debugger.clone(),
            script: config.script.clone(),
            target: target.as_ref().to_path_buf(),
        }
    }

    pub fn supervisor(&self) -> &ProcessSupervisor<K> {
        &self.supervisor
    }

    pub fn command_for(&self, sample: &Path) -> DebuggerCommand {
        DebuggerCommand {
            debugger: self.debugger.clone(),
            script: self.script.clone(),
            target: self.target.clone(),
            sample: sample.to_path_buf(),
        }
    }

    /// Triage every sample in order. Failures are recorded per sample and
    /// never stop the batch.
    pub fn run(&self, samples: &[PathBuf]) -> TriageSummary {
        let started_at = Utc::now().to_rfc3339();
        let outcomes = samples.iter().map(|sample| self.triage_sample(sample)).collect();
        TriageSummary {
            target: self.target.clone(),
            corpus: self.classifier.layout().root.clone(),
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            outcomes,
        }
    }

    pub fn triage_sample(&self, sample: &Path) -> SampleOutcome {
        let mut outcome = SampleOutcome::new(sample);

        // Hash before filing moves or deletes the sample.
        match sha256_file(sample) {
            Ok(digest) => outcome.sha256 = Some(digest),
            Err(err) => warn!(sample = %sample.display(), "could not hash sample: {err:#}"),
        }

        let command = self.command_for(sample);
        info!("{command}");
        let captured = match self.supervisor.run(&command) {
            Ok(captured) => captured,
            Err(err) => {
                error!(sample = %sample.display(), "{err}");
                outcome.error = Some(err.to_string());
                return outcome;
            }
        };
        outcome.exit_code = captured.exit_code;
        outcome.watchdog = Some(captured.watchdog);
        if captured.stdout.trim().is_empty() {
            warn!(sample = %sample.display(), "debugger produced no output");
        }

        let lookup = find_exploitability(&captured.stdout);
        outcome.exploitability = lookup.tag();

        match parse_transcript(sample, &captured.stdout) {
            Ok(record) => {
                let record_score = score(&record);
                debug!(sample = %sample.display(), score = record_score, address = %record.crash_address, "parsed crash");
                outcome.crash_address = Some(record.crash_address);
                outcome.score = Some(record_score);
            }
            Err(err) => {
                if lookup.tag() == Some(ExploitabilityTag::NotAnException) {
                    debug!(sample = %sample.display(), "no crash record: {err}");
                } else {
                    warn!(sample = %sample.display(), "skipping crash record: {err}");
                }
                outcome.parse_error = Some(err.to_string());
            }
        }

        match self.classifier.classify(sample, &captured.stdout, &lookup) {
            Ok(disposition) => outcome.disposition = Some(disposition),
            Err(err) => {
                error!(sample = %sample.display(), "{err}");
                outcome.error = Some(err.to_string());
            }
        }

        outcome
    }
}
