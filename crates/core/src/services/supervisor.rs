use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sysinfo::{Process, System};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Wall-clock budget for one debugger run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// How often the watchdog checks whether the debugger has finished.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum SuperviseError {
    #[error("Failed to spawn debugger {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to capture debugger output: {0}")]
    Capture(#[source] std::io::Error),
}

/// Full debugger invocation for one crash sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerCommand {
    pub debugger: PathBuf,
    /// Debugger command script, e.g. `!analyze -v;kv;.load msec; !exploitable -v; q`.
    pub script: String,
    /// Program under test; its process is what the watchdog kills.
    pub target: PathBuf,
    pub sample: PathBuf,
}

impl DebuggerCommand {
    /// Arguments after the debugger path: go without an initial break, run the
    /// script, then the target and the sample it should open.
    pub fn args(&self) -> Vec<String> {
        vec![
            "-g".to_string(),
            "-c".to_string(),
            self.script.clone(),
            self.target.display().to_string(),
            self.sample.display().to_string(),
        ]
    }

    /// Process name the target shows up as.
    pub fn target_process_name(&self) -> String {
        target_process_name(&self.target.to_string_lossy())
    }
}

impl fmt::Display for DebuggerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.debugger.display())?;
        for arg in self.args() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Final path component of `target`, splitting on both `/` and `\` so a
/// Windows-style path resolves the same way on any host.
pub fn target_process_name(target: &str) -> String {
    target.rsplit(['/', '\\']).next().unwrap_or(target).to_string()
}

/// Kills a running process by name once the watchdog fires.
pub trait ProcessKiller: Send + Sync {
    /// Kill the first process whose name equals `name`; true if one was killed.
    fn kill_first_named(&self, name: &str) -> bool;
}

/// Longest process name the Linux kernel keeps; longer names are cut to this.
const KERNEL_NAME_LIMIT: usize = 15;

/// Kills through the operating system's process table.
///
/// Which process is "first" when several share the name is whatever order the
/// process table yields; running several same-named targets at once can kill
/// the wrong one.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessKiller;

impl ProcessKiller for SystemProcessKiller {
    fn kill_first_named(&self, name: &str) -> bool {
        let mut system = System::new();
        system.refresh_processes();
        let killed = system
            .processes()
            .values()
            .filter(|process| process_has_name(process, name))
            .any(|process| process.kill());
        killed
    }
}

/// Exact name match, falling back to the command line's program name when
/// the kernel may have truncated the reported name.
fn process_has_name(process: &Process, name: &str) -> bool {
    if process.name() == name {
        return true;
    }
    if name.len() < KERNEL_NAME_LIMIT {
        return false;
    }
    process
        .cmd()
        .first()
        .and_then(|program| program.rsplit(['/', '\\']).next())
        .is_some_and(|program| program == name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT, poll_interval: DEFAULT_POLL_INTERVAL }
    }
}

/// What the watchdog ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchdogOutcome {
    /// The debugger finished within the timeout; nothing was killed.
    Cancelled,
    /// The timeout elapsed and a kill of the target was attempted.
    Fired { killed: bool },
}

impl WatchdogOutcome {
    pub fn timed_out(&self) -> bool {
        matches!(self, WatchdogOutcome::Fired { .. })
    }
}

/// Captured result of one supervised debugger run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedOutput {
    pub stdout: String,
    /// `None` when the debugger was terminated by a signal.
    pub exit_code: Option<i32>,
    pub watchdog: WatchdogOutcome,
}

/// Runs the debugger against one sample under a timeout.
///
/// One watchdog thread runs alongside output capture. It only ever reads the
/// shared `running` flag, and it is the only party that kills anything.
pub struct ProcessSupervisor<K: ProcessKiller = SystemProcessKiller> {
    config: SupervisorConfig,
    killer: K,
}

impl ProcessSupervisor<SystemProcessKiller> {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config, killer: SystemProcessKiller }
    }
}

impl<K: ProcessKiller> ProcessSupervisor<K> {
    pub fn with_killer(config: SupervisorConfig, killer: K) -> Self {
        Self { config, killer }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn killer(&self) -> &K {
        &self.killer
    }

    /// Launch the debugger and block until it exits.
    ///
    /// On timeout the *target* process is killed rather than the debugger; the
    /// debugger then sees its debuggee die and exits by itself, so whatever it
    /// printed is still returned.
    pub fn run(&self, command: &DebuggerCommand) -> Result<SupervisedOutput, SuperviseError> {
        self.run_program(&command.debugger, &command.args(), &command.target_process_name())
    }

    /// Supervise an arbitrary program, killing `target_name` on timeout.
    pub fn run_program(
        &self,
        program: &Path,
        args: &[String],
        target_name: &str,
    ) -> Result<SupervisedOutput, SuperviseError> {
        debug!(program = %program.display(), ?args, "spawning debugger");
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| SuperviseError::Spawn { path: program.to_path_buf(), source })?;

        let running = AtomicBool::new(true);
        let (output, watchdog) = thread::scope(|scope| {
            let watchdog = scope.spawn(|| self.watch(&running, target_name));
            let output = child.wait_with_output();
            running.store(false, Ordering::Release);
            // A panicking watchdog never got as far as killing anything.
            let outcome = watchdog.join().unwrap_or(WatchdogOutcome::Cancelled);
            (output, outcome)
        });

        let output = output.map_err(SuperviseError::Capture)?;
        Ok(SupervisedOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            exit_code: output.status.code(),
            watchdog,
        })
    }

    fn watch(&self, running: &AtomicBool, target_name: &str) -> WatchdogOutcome {
        let started = Instant::now();
        while started.elapsed() < self.config.timeout {
            if !running.load(Ordering::Acquire) {
                debug!("debugger finished before timeout; watchdog stands down");
                return WatchdogOutcome::Cancelled;
            }
            let remaining = self.config.timeout.saturating_sub(started.elapsed());
            thread::sleep(self.config.poll_interval.min(remaining));
        }
        if !running.load(Ordering::Acquire) {
            return WatchdogOutcome::Cancelled;
        }

        warn!(
            process = target_name,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "wait time reached; killing target"
        );
        let killed = self.killer.kill_first_named(target_name);
        if killed {
            info!(process = target_name, "target process killed");
        } else {
            warn!(process = target_name, "no running process matched the target name");
        }
        WatchdogOutcome::Fired { killed }
    }
}
