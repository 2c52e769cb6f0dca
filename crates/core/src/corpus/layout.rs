use std::path::{Path, PathBuf};

use crate::model::ExploitabilityTag;

/// Extension of transcript sidecar files written next to filed samples.
pub const TRANSCRIPT_EXTENSION: &str = "log";

/// Logical layout of a crash corpus on disk.
///
/// This is derived from the corpus root. It does *not* perform any IO itself;
/// the classifier is responsible for creating directories and moving files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusLayout {
    /// Directory holding the unsorted crash samples.
    pub root: PathBuf,
}

impl CorpusLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    /// Directory a sample with `tag` is filed into, named exactly after the tag.
    pub fn classification_dir(&self, tag: ExploitabilityTag) -> PathBuf {
        self.root.join(tag.as_str())
    }

    /// Where a sample named `sample_name` ends up once filed under `tag`.
    pub fn filed_sample_path(&self, tag: ExploitabilityTag, sample_name: &str) -> PathBuf {
        self.classification_dir(tag).join(sample_name)
    }

    /// Transcript sidecar for a filed sample: `<tag>/<sample_name>.log`.
    pub fn sidecar_path(&self, tag: ExploitabilityTag, sample_name: &str) -> PathBuf {
        self.classification_dir(tag).join(format!("{sample_name}.{TRANSCRIPT_EXTENSION}"))
    }
}
