//! Triage configuration.
//!
//! Everything that used to be a script-level global (debugger location, the
//! debugger command script, the timeout, the delete policy) is a field here and
//! is handed explicitly to the supervisor, classifier and pipeline.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::classifier::ClassifierPolicy;
use crate::services::supervisor::SupervisorConfig;

/// Environment variable overriding the default debugger location.
pub const DEBUGGER_ENV: &str = "CDB_PATH";

/// Where the console debugger is installed by default.
pub const DEFAULT_DEBUGGER_PATH: &str =
    "c:\\Program Files\\Debugging Tools for Windows (x86)\\cdb.exe";

/// Analyze, dump the stack, load `!exploitable`, classify, quit.
pub const DEFAULT_SCRIPT: &str = "!analyze -v;kv;.load msec; !exploitable -v; q";

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read triage config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse triage config {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("Unsupported triage config format '{0}' (expected json, yaml or yml)")]
    UnsupportedFormat(String),
}

/// Serializable triage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Path to the console debugger.
    pub debugger: PathBuf,
    /// Debugger command script run against every sample.
    pub script: String,
    /// Wall-clock budget for one debugger run, in seconds.
    pub timeout_secs: u64,
    /// Watchdog polling interval, in milliseconds.
    pub poll_interval_ms: u64,
    /// Delete samples classified `NOT_AN_EXCEPTION`.
    pub delete_non_exceptions: bool,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            debugger: resolve_debugger_path(),
            script: DEFAULT_SCRIPT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            delete_non_exceptions: true,
        }
    }
}

impl TriageConfig {
    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }

    pub fn classifier_policy(&self) -> ClassifierPolicy {
        ClassifierPolicy { delete_non_exceptions: self.delete_non_exceptions }
    }
}

/// `CDB_PATH` if set, otherwise the default install location.
pub fn resolve_debugger_path() -> PathBuf {
    env::var_os(DEBUGGER_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DEBUGGER_PATH))
}

/// Load a config file, picking JSON or YAML by extension.
///
/// Fields missing from the file take their defaults.
pub fn load_config(path: &Path) -> Result<TriageConfig, ConfigError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase();
    if !matches!(ext.as_str(), "json" | "yaml" | "yml") {
        return Err(ConfigError::UnsupportedFormat(ext));
    }

    let body = fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;

    let parsed = if ext == "json" {
        serde_json::from_str(&body).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&body).map_err(|e| e.to_string())
    };
    parsed.map_err(|message| ConfigError::Parse { path: path.to_path_buf(), message })
}
