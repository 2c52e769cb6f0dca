use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use triage_core::corpus::list_samples;
use triage_core::services::{Disposition, SampleOutcome, TriagePipeline, TriageSummary};

use crate::commands::{check_triage_inputs, load_triage_config};

/// Options for `crash-triage triage`. Unset overrides keep the config value.
#[derive(Debug, Clone, Default)]
pub struct TriageOptions {
    pub target: PathBuf,
    pub crash_dir: PathBuf,
    pub config: Option<PathBuf>,
    pub debugger: Option<PathBuf>,
    pub script: Option<String>,
    pub timeout_secs: Option<u64>,
    pub keep_non_exceptions: bool,
    pub json: bool,
}

/// Run every sample in the crash directory under the debugger and file it.
pub fn triage_command(options: &TriageOptions) -> Result<()> {
    check_triage_inputs(&options.target, &options.crash_dir)?;

    let mut config = load_triage_config(options.config.as_deref())?;
    if let Some(debugger) = &options.debugger {
        config.debugger = debugger.clone();
    }
    if let Some(script) = &options.script {
        config.script = script.clone();
    }
    if let Some(timeout) = options.timeout_secs {
        config.timeout_secs = timeout;
    }
    if options.keep_non_exceptions {
        config.delete_non_exceptions = false;
    }

    let samples = list_samples(&options.crash_dir)?;
    let pipeline = TriagePipeline::new(&config, &options.target, &options.crash_dir);
    let summary = pipeline.run(&samples);

    if options.json {
        let serialized = serde_json::to_string_pretty(&summary)
            .context("Failed to serialize triage summary to JSON")?;
        println!("{}", serialized);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &TriageSummary) {
    println!("Triaged {} sample(s) in {}", summary.outcomes.len(), summary.corpus.display());
    for outcome in &summary.outcomes {
        println!("  - {}", describe_outcome(outcome));
    }

    let counts = summary.counts();
    println!(
        "Filed: {}, Deleted: {}, Kept: {}, Unclassified: {}, Failed: {}, Timed out: {}",
        counts.filed,
        counts.deleted,
        counts.kept,
        counts.unclassified,
        counts.failed,
        counts.timed_out
    );
}

/// One-line description of what happened to a sample.
pub fn describe_outcome(outcome: &SampleOutcome) -> String {
    let name = display_name(&outcome.sample);
    let action = match &outcome.disposition {
        Some(Disposition::Filed { tag, .. }) => format!("filed as {tag}"),
        Some(Disposition::Deleted) => "deleted (NOT_AN_EXCEPTION)".to_string(),
        Some(Disposition::Kept) => "kept (NOT_AN_EXCEPTION)".to_string(),
        Some(Disposition::Unclassified { reason }) => format!("left in place ({reason})"),
        None => format!("failed: {}", outcome.error.as_deref().unwrap_or("unknown error")),
    };

    let mut line = format!("{name}: {action}");
    if let Some(score) = outcome.score {
        line.push_str(&format!(" [score {score}]"));
    }
    if outcome.watchdog.is_some_and(|w| w.timed_out()) {
        line.push_str(" [timed out]");
    }
    line
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
