//! Crash corpus on disk: where samples live, where they get filed, and how
//! transcripts are found again for analysis.

pub mod layout;

use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

pub use layout::{CorpusLayout, TRANSCRIPT_EXTENSION};

/// Regular files directly under `dir`, sorted by path.
///
/// Subdirectories (including classification folders from earlier runs) are
/// not descended into, so filed samples are never triaged twice.
pub fn list_samples(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut samples = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?;
        if entry.file_type()?.is_file() {
            samples.push(entry.path());
        }
    }
    samples.sort();
    Ok(samples)
}

/// All `*.log` transcripts under `dir`, sorted by path.
///
/// With `recursive`, subdirectories are searched as well.
pub fn collect_transcripts(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    collect_into(dir, recursive, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_into(dir: &Path, recursive: bool, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            if recursive {
                collect_into(&path, recursive, found)?;
            }
        } else if file_type.is_file()
            && path.extension().and_then(|e| e.to_str()) == Some(TRANSCRIPT_EXTENSION)
        {
            found.push(path);
        }
    }
    Ok(())
}

/// Compute the SHA-256 hash of a file and return it as a hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open sample for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read sample for hashing: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
