//! Core data model for debugger crash transcripts.
//!
//! A [`CrashRecord`] is produced in one shot by the transcript parser and is
//! read-only afterwards. Scores and groups are always derived from records on
//! demand; nothing in this module is persisted.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Register name (as printed by the debugger, e.g. `eip`) to its hex string value.
///
/// Values are kept verbatim: no normalization of case or leading zeros.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSet {
    registers: BTreeMap<String, String>,
}

impl RegisterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a register value. Later dumps win over earlier ones.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.registers.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.registers.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.registers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.registers.values().map(String::as_str)
    }

    /// Derive the register width from the instruction pointer that is present.
    ///
    /// `eip` is checked before `rip`, so a dump carrying both reads as 32-bit.
    pub fn bitness(&self) -> Option<Bitness> {
        if self.contains(Bitness::X86.instruction_pointer()) {
            Some(Bitness::X86)
        } else if self.contains(Bitness::X64.instruction_pointer()) {
            Some(Bitness::X64)
        } else {
            None
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RegisterSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = RegisterSet::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

/// Register width of the crashing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bitness {
    #[serde(rename = "32")]
    X86,
    #[serde(rename = "64")]
    X64,
}

impl Bitness {
    pub fn bits(self) -> u32 {
        match self {
            Bitness::X86 => 32,
            Bitness::X64 => 64,
        }
    }

    pub fn instruction_pointer(self) -> &'static str {
        match self {
            Bitness::X86 => "eip",
            Bitness::X64 => "rip",
        }
    }

    pub fn base_pointer(self) -> &'static str {
        match self {
            Bitness::X86 => "ebp",
            Bitness::X64 => "rbp",
        }
    }

    pub fn stack_pointer(self) -> &'static str {
        match self {
            Bitness::X86 => "esp",
            Bitness::X64 => "rsp",
        }
    }
}

/// Marker the exploitability extension prints for a frame it cannot resolve.
pub const UNKNOWN_FRAME: &str = "Unknown";

/// One entry of the unwound call stack, top of stack first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackFrame {
    /// The frame could not be resolved (`Unknown`).
    Unknown,
    /// A resolved frame such as `module!symbol+0x1f`, kept verbatim.
    Symbol(String),
}

impl StackFrame {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line == UNKNOWN_FRAME {
            StackFrame::Unknown
        } else {
            StackFrame::Symbol(line.to_string())
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, StackFrame::Unknown)
    }

    pub fn as_str(&self) -> &str {
        match self {
            StackFrame::Unknown => UNKNOWN_FRAME,
            StackFrame::Symbol(text) => text,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification emitted by the `!exploitable` debugger extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExploitabilityTag {
    Exploitable,
    ProbablyExploitable,
    ProbablyNotExploitable,
    Unknown,
    NotAnException,
}

impl ExploitabilityTag {
    pub const ALL: [ExploitabilityTag; 5] = [
        ExploitabilityTag::Exploitable,
        ExploitabilityTag::ProbablyExploitable,
        ExploitabilityTag::ProbablyNotExploitable,
        ExploitabilityTag::Unknown,
        ExploitabilityTag::NotAnException,
    ];

    /// The exact string the extension prints, which is also the filing directory name.
    pub fn as_str(self) -> &'static str {
        match self {
            ExploitabilityTag::Exploitable => "EXPLOITABLE",
            ExploitabilityTag::ProbablyExploitable => "PROBABLY_EXPLOITABLE",
            ExploitabilityTag::ProbablyNotExploitable => "PROBABLY_NOT_EXPLOITABLE",
            ExploitabilityTag::Unknown => "UNKNOWN",
            ExploitabilityTag::NotAnException => "NOT_AN_EXCEPTION",
        }
    }
}

impl fmt::Display for ExploitabilityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExploitabilityTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExploitabilityTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| format!("Unrecognized exploitability classification '{s}'"))
    }
}

/// Structured view of a single debugger transcript.
///
/// Only the transcript parser builds these, and it guarantees that `bitness`
/// matches the instruction pointer `crash_address` was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashRecord {
    /// Transcript the record was parsed from.
    pub source: PathBuf,
    pub registers: RegisterSet,
    pub bitness: Bitness,
    /// The instruction pointer value, verbatim.
    pub crash_address: String,
    /// Disassembly line of the faulting instruction.
    pub instruction_line: String,
    /// Unwound stack, top frame first.
    pub stack_trace: Vec<StackFrame>,
    /// `Instruction Address:` trailer of the stack block, when the extension printed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction_address: Option<String>,
    /// `None` when the transcript has zero or several classification lines.
    pub exploitability: Option<ExploitabilityTag>,
}

impl CrashRecord {
    pub fn base_pointer(&self) -> Option<&str> {
        self.registers.get(self.bitness.base_pointer())
    }

    pub fn stack_pointer(&self) -> Option<&str> {
        self.registers.get(self.bitness.stack_pointer())
    }

    pub fn top_frame(&self) -> Option<&StackFrame> {
        self.stack_trace.first()
    }
}
