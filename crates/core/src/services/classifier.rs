use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::TagLookup;
use crate::corpus::CorpusLayout;
use crate::model::ExploitabilityTag;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Failed to create classification directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The sample was already moved to `sample` when the write failed.
    #[error("Filed sample at {sample} but failed to write transcript {path}: {source}")]
    WriteLog {
        sample: PathBuf,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Sample path has no file name: {0}")]
    NoFileName(PathBuf),
}

/// Knobs for what filing is allowed to do to a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierPolicy {
    /// Remove samples whose run raised no exception at all.
    pub delete_non_exceptions: bool,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self { delete_non_exceptions: true }
    }
}

/// What happened to a sample after classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Disposition {
    /// Moved into its classification directory with a transcript sidecar.
    Filed { tag: ExploitabilityTag, sample: PathBuf, log: PathBuf },
    /// `NOT_AN_EXCEPTION` under the delete policy.
    Deleted,
    /// `NOT_AN_EXCEPTION` with deletion disabled; left where it was.
    Kept,
    /// Classification could not be determined; left in place for a human.
    Unclassified { reason: String },
}

/// Files individual samples by their exploitability classification.
#[derive(Debug, Clone)]
pub struct Classifier {
    layout: CorpusLayout,
    policy: ClassifierPolicy,
}

impl Classifier {
    pub fn new(layout: CorpusLayout, policy: ClassifierPolicy) -> Self {
        Self { layout, policy }
    }

    pub fn layout(&self) -> &CorpusLayout {
        &self.layout
    }

    pub fn policy(&self) -> &ClassifierPolicy {
        &self.policy
    }

    /// File `sample` according to `lookup`, writing `transcript` alongside it.
    ///
    /// An undetermined classification never touches the sample.
    pub fn classify(
        &self,
        sample: &Path,
        transcript: &str,
        lookup: &TagLookup,
    ) -> Result<Disposition, ClassifyError> {
        let tag = match lookup {
            TagLookup::Found(tag) => *tag,
            other => {
                let reason = other.describe();
                warn!(sample = %sample.display(), %reason, "leaving sample in place");
                return Ok(Disposition::Unclassified { reason });
            }
        };

        if tag == ExploitabilityTag::NotAnException {
            if !self.policy.delete_non_exceptions {
                return Ok(Disposition::Kept);
            }
            fs::remove_file(sample)
                .map_err(|source| ClassifyError::Delete { path: sample.to_path_buf(), source })?;
            info!(sample = %sample.display(), "deleted sample that raised no exception");
            return Ok(Disposition::Deleted);
        }

        let name = sample
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClassifyError::NoFileName(sample.to_path_buf()))?;

        let dir = self.layout.classification_dir(tag);
        fs::create_dir_all(&dir)
            .map_err(|source| ClassifyError::CreateDir { path: dir.clone(), source })?;

        let destination = self.layout.filed_sample_path(tag, name);
        move_file(sample, &destination).map_err(|source| ClassifyError::Move {
            from: sample.to_path_buf(),
            to: destination.clone(),
            source,
        })?;

        let log = self.layout.sidecar_path(tag, name);
        fs::write(&log, transcript)
            .map_err(|source| ClassifyError::WriteLog {
                sample: destination.clone(),
                path: log.clone(),
                source,
            })?;

        info!(sample = %sample.display(), %tag, "filed sample");
        Ok(Disposition::Filed { tag, sample: destination, log })
    }
}

/// Rename, falling back to copy + remove when the rename crosses filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if fs::copy(from, to).is_err() {
                return Err(rename_err);
            }
            fs::remove_file(from)
        }
    }
}
