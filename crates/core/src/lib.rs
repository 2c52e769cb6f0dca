//! triage-core
//!
//! Core library for debugger-driven crash triage.
//!
//! A crash sample is run under a console debugger with a bounded wall-clock
//! budget, the captured transcript is parsed into a [`model::CrashRecord`],
//! and samples are filed by their exploitability classification. Across a
//! corpus, records are grouped by faulting address and ranked by a severity
//! score so the most interesting crashes surface first.
//!
//! The goal is to keep all substantive logic here so it is fully testable and
//! reusable from multiple frontends.

pub mod analysis;
pub mod config;
pub mod corpus;
pub mod model;
pub mod report;
pub mod services;

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
