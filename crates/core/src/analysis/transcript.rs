use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::model::{CrashRecord, ExploitabilityTag, RegisterSet, StackFrame};

/// Line marker preceding the tag printed by `!exploitable`.
pub const EXPLOITABILITY_MARKER: &str = "Exploitability Classification: ";

/// Header of the stack block printed by `!exploitable -v`.
pub const STACK_TRACE_MARKER: &str = "Stack Trace:";

/// Trailer line the extension appends to the stack block. It is not a frame.
pub const INSTRUCTION_ADDRESS_MARKER: &str = "Instruction Address:";

/// Fixed width of register names in the debugger's register dump.
const REGISTER_NAME_WIDTH: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("No instruction pointer was found")]
    MissingInstructionPointer,
    #[error("No stack trace block was found")]
    MissingStackTrace,
    #[error("No instruction line starts with crash address {address}")]
    MissingInstructionLine { address: String },
}

/// Outcome of looking for the exploitability classification line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagLookup {
    Found(ExploitabilityTag),
    /// No classification line at all.
    Missing,
    /// More than one classification line; the count is kept for reporting.
    Multiple(usize),
    /// Exactly one line, but its text is not one of the known tags.
    Unrecognized(String),
}

impl TagLookup {
    pub fn tag(&self) -> Option<ExploitabilityTag> {
        match self {
            TagLookup::Found(tag) => Some(*tag),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TagLookup::Found(tag) => tag.to_string(),
            TagLookup::Missing => "no exploitability classification line".to_string(),
            TagLookup::Multiple(n) => format!("{n} exploitability classification lines"),
            TagLookup::Unrecognized(text) => format!("unrecognized classification '{text}'"),
        }
    }
}

/// Parse a debugger transcript into a [`CrashRecord`].
///
/// `source` is recorded verbatim and is only used for reporting.
pub fn parse_transcript(source: impl AsRef<Path>, text: &str) -> Result<CrashRecord, ParseError> {
    let registers = parse_registers(text);
    let bitness = registers.bitness().ok_or(ParseError::MissingInstructionPointer)?;
    let crash_address = registers
        .get(bitness.instruction_pointer())
        .ok_or(ParseError::MissingInstructionPointer)?
        .to_string();

    let instruction_line = find_instruction_line(text, &crash_address)
        .ok_or_else(|| ParseError::MissingInstructionLine { address: crash_address.clone() })?
        .to_string();

    let block = parse_stack_block(text).ok_or(ParseError::MissingStackTrace)?;

    let exploitability = match find_exploitability(text) {
        TagLookup::Found(tag) => Some(tag),
        other => {
            debug!(source = %source.as_ref().display(), "classification undetermined: {}", other.describe());
            None
        }
    };

    Ok(CrashRecord {
        source: source.as_ref().to_path_buf(),
        registers,
        bitness,
        crash_address,
        instruction_line,
        stack_trace: block.frames,
        instruction_address: block.instruction_address,
        exploitability,
    })
}

/// Collect `name=value` register assignments from the register dump lines.
///
/// Only lines mentioning an instruction pointer (`ip=`) or accumulator (`ax=`)
/// are dump lines. Within them a token counts only when its first `=` sits
/// right after a three character name, which is how the debugger lays out its
/// fixed-width register columns; `cs=001b`, `iopl=0` and similar are skipped.
pub fn parse_registers(text: &str) -> RegisterSet {
    let mut registers = RegisterSet::new();
    for line in text.lines() {
        if !(line.contains("ip=") || line.contains("ax=")) {
            continue;
        }
        for token in line.split_whitespace() {
            if token.find('=') != Some(REGISTER_NAME_WIDTH) {
                continue;
            }
            let mut parts = token.split('=');
            if let (Some(name), Some(value)) = (parts.next(), parts.next()) {
                registers.insert(name, value);
            }
        }
    }
    registers
}

/// First line whose text starts with the crash address.
pub fn find_instruction_line<'a>(text: &'a str, crash_address: &str) -> Option<&'a str> {
    if crash_address.is_empty() {
        return None;
    }
    text.lines().find(|line| line.starts_with(crash_address))
}

#[derive(Debug, Default)]
struct StackBlock {
    frames: Vec<StackFrame>,
    instruction_address: Option<String>,
}

/// Frames between the `Stack Trace:` header and the first blank line.
///
/// A block that is never closed by a blank line is treated as missing.
fn parse_stack_block(text: &str) -> Option<StackBlock> {
    let mut lines = text.lines();
    lines.by_ref().find(|line| line.trim_start().starts_with(STACK_TRACE_MARKER))?;

    let mut block = StackBlock::default();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            return Some(block);
        }
        if let Some(rest) = line.strip_prefix(INSTRUCTION_ADDRESS_MARKER) {
            block.instruction_address = Some(rest.trim().to_string());
            continue;
        }
        block.frames.push(StackFrame::parse(line));
    }
    // Cut off before its closing blank line.
    None
}

/// Parse only the stack trace of a transcript.
pub fn parse_stack_trace(text: &str) -> Result<Vec<StackFrame>, ParseError> {
    parse_stack_block(text).map(|b| b.frames).ok_or(ParseError::MissingStackTrace)
}

/// Locate the single exploitability classification line.
pub fn find_exploitability(text: &str) -> TagLookup {
    let mut matches = text.lines().filter_map(|line| {
        line.split_once(EXPLOITABILITY_MARKER).map(|(_, rest)| rest.trim())
    });

    let first = match matches.next() {
        Some(first) => first,
        None => return TagLookup::Missing,
    };
    let extra = matches.count();
    if extra > 0 {
        return TagLookup::Multiple(extra + 1);
    }

    match first.parse::<ExploitabilityTag>() {
        Ok(tag) => TagLookup::Found(tag),
        Err(_) => TagLookup::Unrecognized(first.to_string()),
    }
}
