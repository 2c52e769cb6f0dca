use std::path::Path;

use anyhow::{anyhow, Context, Result};
use triage_core::config::{load_config, TriageConfig};

/// Load the triage config from `path`, or fall back to defaults.
pub fn load_triage_config(path: Option<&Path>) -> Result<TriageConfig> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load triage config {}", path.display())),
        None => Ok(TriageConfig::default()),
    }
}

/// Startup checks for `triage`: the target must exist and the crash
/// directory must be a directory.
pub fn check_triage_inputs(target: &Path, crash_dir: &Path) -> Result<()> {
    if !target.exists() {
        return Err(anyhow!("{} does not exist", target.display()));
    }
    check_directory(crash_dir)
}

pub fn check_directory(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(anyhow!("{} is not a valid directory", dir.display()));
    }
    Ok(())
}
