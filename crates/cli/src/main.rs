use std::path::PathBuf;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use crash_triage::commands::{
    analyze_command, check_directory, check_triage_inputs, triage_command, TriageOptions,
};
use crash_triage::init_logging;

/// Debugger-driven crash triage CLI.
///
/// This CLI is a thin wrapper around `triage-core` (exposed in code as
/// `triage_core`). All substantive logic lives in the library so it can be
/// tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "crash-triage",
    version,
    about = "Run fuzzer crashes under a debugger, file them by exploitability, and rank them",
    long_about = None
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run each crash sample under the debugger and file it by classification.
    ///
    /// Samples are moved into `<CRASH_DIR>/<CLASSIFICATION>/` next to a
    /// `<sample>.log` transcript. NOT_AN_EXCEPTION samples are deleted unless
    /// `--keep-non-exceptions` is given; unclassifiable ones stay in place.
    Triage {
        /// Program the debugger launches with each sample.
        target: PathBuf,

        /// Directory of crash samples.
        crash_dir: PathBuf,

        /// Triage config file (.json, .yaml or .yml).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to the console debugger. Defaults to $CDB_PATH or the standard install.
        #[arg(long)]
        debugger: Option<PathBuf>,

        /// Debugger command script run against each sample.
        #[arg(long)]
        script: Option<String>,

        /// Seconds before the target is killed.
        #[arg(long)]
        timeout: Option<u64>,

        /// Leave NOT_AN_EXCEPTION samples in place instead of deleting them.
        #[arg(long, default_value_t = false)]
        keep_non_exceptions: bool,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Group and rank previously captured debugger transcripts (*.log).
    Analyze {
        /// Directory containing crash transcripts.
        log_dir: PathBuf,

        /// Group transcripts by the faulting instruction.
        #[arg(short, long, default_value_t = false)]
        instructions: bool,

        /// Sort transcripts by score.
        #[arg(short, long, default_value_t = false)]
        score: bool,

        /// Also read transcripts from subdirectories.
        #[arg(short = 'R', long, default_value_t = false)]
        recursive: bool,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Triage {
            target,
            crash_dir,
            config,
            debugger,
            script,
            timeout,
            keep_non_exceptions,
            json,
        } => {
            if let Err(err) = check_triage_inputs(&target, &crash_dir) {
                usage_error(err);
            }
            triage_command(&TriageOptions {
                target,
                crash_dir,
                config,
                debugger,
                script,
                timeout_secs: timeout,
                keep_non_exceptions,
                json,
            })?
        }
        Command::Analyze { log_dir, instructions, score, recursive, json } => {
            if let Err(err) = check_directory(&log_dir) {
                usage_error(err);
            }
            analyze_command(&log_dir, instructions, score, recursive, json)?
        }
    }

    Ok(())
}

/// Startup preconditions exit immediately with usage.
fn usage_error(err: anyhow::Error) -> ! {
    Cli::command().error(ErrorKind::ValueValidation, err).exit()
}
