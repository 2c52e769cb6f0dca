//! Transcript analysis: parsing, scoring and grouping.
//!
//! Everything here is pure and in-memory. Parsing turns raw debugger output
//! into a [`CrashRecord`](crate::model::CrashRecord); scoring and grouping are
//! functions over finished records and never mutate them.

pub mod grouping;
pub mod scoring;
pub mod transcript;

pub use grouping::{group_by_address, CrashGroup};
pub use scoring::{
    byte_repetition_rating, frame_offset, has_stack_corruption, score, score_breakdown,
    ScoreBreakdown,
};
pub use transcript::{
    find_exploitability, find_instruction_line, parse_registers, parse_stack_trace,
    parse_transcript, ParseError, TagLookup,
};
