//! Side-effecting services: running the debugger, filing samples, and the
//! serial triage driver that ties them to the analysis layer.

pub mod classifier;
pub mod supervisor;
pub mod triage;

pub use classifier::{Classifier, ClassifierPolicy, ClassifyError, Disposition};
pub use supervisor::{
    target_process_name, DebuggerCommand, ProcessKiller, ProcessSupervisor, SuperviseError,
    SupervisedOutput, SupervisorConfig, SystemProcessKiller, WatchdogOutcome,
};
pub use triage::{SampleOutcome, TriageCounts, TriagePipeline, TriageSummary};
