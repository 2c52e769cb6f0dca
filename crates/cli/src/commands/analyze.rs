use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;
use triage_core::analysis::parse_transcript;
use triage_core::corpus::collect_transcripts;
use triage_core::model::CrashRecord;
use triage_core::report::{
    group_views, ranked_views, render_by_address, render_by_score, GroupView, RankedView,
};

use crate::commands::check_directory;

#[derive(Debug, Serialize)]
struct AnalysisReport {
    parsed: usize,
    skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    groups: Option<Vec<GroupView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ranked: Option<Vec<RankedView>>,
}

/// Parse every transcript under `dir` and print the requested views.
///
/// With neither `instructions` nor `score` set, the by-address view is shown.
pub fn analyze_command(
    dir: &Path,
    instructions: bool,
    score: bool,
    recursive: bool,
    json: bool,
) -> Result<()> {
    check_directory(dir)?;
    let (records, skipped) = load_records(dir, recursive)?;
    let by_address = instructions || !score;

    if json {
        let report = AnalysisReport {
            parsed: records.len(),
            skipped,
            groups: by_address.then(|| group_views(&records)),
            ranked: score.then(|| ranked_views(&records)),
        };
        let serialized = serde_json::to_string_pretty(&report)
            .context("Failed to serialize analysis report to JSON")?;
        println!("{}", serialized);
        return Ok(());
    }

    if records.is_empty() {
        println!("No crash transcripts parsed in {}", dir.display());
        return Ok(());
    }
    if by_address {
        print!("{}", render_by_address(&records));
    }
    if score {
        print!("{}", render_by_score(&records));
    }

    Ok(())
}

/// Parse all transcripts, reporting and skipping the ones that fail.
pub fn load_records(dir: &Path, recursive: bool) -> Result<(Vec<CrashRecord>, usize)> {
    let paths = collect_transcripts(dir, recursive)?;
    let mut records = Vec::with_capacity(paths.len());
    let mut skipped = 0;

    for path in paths {
        match read_record(&path) {
            Ok(record) => records.push(record),
            Err(err) => {
                eprintln!("Skipping {}: {:#}", path.display(), err);
                skipped += 1;
            }
        }
    }

    debug!(dir = %dir.display(), parsed = records.len(), skipped, "loaded transcripts");
    Ok((records, skipped))
}

fn read_record(path: &Path) -> Result<CrashRecord> {
    let bytes = fs::read(path).context("Failed to read transcript")?;
    Ok(parse_transcript(path, &String::from_utf8_lossy(&bytes))?)
}
