use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::model::{CrashRecord, StackFrame};

/// A top-frame return offset at or above this suggests a smashed return address.
pub const LARGE_FRAME_OFFSET: u64 = 0x10000;
/// Base/stack pointer distance considered abnormal.
pub const LARGE_POINTER_DISTANCE: u64 = 0x10000;
/// Pointer values at or above this are outside the usual stack region.
pub const POINTER_HIGH_BOUND: u64 = 0xDFFF_FFFF;
/// Pointer values at or below this are outside the usual stack region.
pub const POINTER_LOW_BOUND: u64 = 0x000F_FFFF;

const STACK_CORRUPTION_POINTS: u64 = 3;
const POINTER_DISTANCE_POINTS: u64 = 4;
const POINTER_BOUND_POINTS: u64 = 2;

static FRAME_OFFSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+0x([0-9A-Fa-f]+)").expect("frame offset pattern"));

/// Per-heuristic contributions to a record's score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Sum of [`byte_repetition_rating`] over every register.
    pub repetition: u64,
    pub stack_corruption: u64,
    pub pointer_distance: u64,
    pub base_high: u64,
    pub stack_high: u64,
    pub base_low: u64,
    pub stack_low: u64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u64 {
        self.repetition
            + self.stack_corruption
            + self.pointer_distance
            + self.base_high
            + self.stack_high
            + self.base_low
            + self.stack_low
    }
}

/// Composite severity score; higher means more worth a human's time.
pub fn score(record: &CrashRecord) -> u64 {
    score_breakdown(record).total()
}

pub fn score_breakdown(record: &CrashRecord) -> ScoreBreakdown {
    let mut breakdown = ScoreBreakdown {
        repetition: record.registers.values().map(byte_repetition_rating).sum(),
        ..ScoreBreakdown::default()
    };

    if has_stack_corruption(&record.stack_trace) {
        breakdown.stack_corruption = STACK_CORRUPTION_POINTS;
    }

    // A missing or unreadable pointer register leaves these heuristics at zero.
    let base = record.base_pointer().and_then(parse_hex);
    let stack = record.stack_pointer().and_then(parse_hex);
    if let (Some(base), Some(stack)) = (base, stack) {
        if base.abs_diff(stack) >= LARGE_POINTER_DISTANCE {
            breakdown.pointer_distance = POINTER_DISTANCE_POINTS;
        }
    } else {
        trace!(source = %record.source.display(), "pointer registers unavailable for bounds checks");
    }
    if let Some(base) = base {
        breakdown.base_high = bound_points(base >= POINTER_HIGH_BOUND);
        breakdown.base_low = bound_points(base <= POINTER_LOW_BOUND);
    }
    if let Some(stack) = stack {
        breakdown.stack_high = bound_points(stack >= POINTER_HIGH_BOUND);
        breakdown.stack_low = bound_points(stack <= POINTER_LOW_BOUND);
    }

    breakdown
}

fn bound_points(hit: bool) -> u64 {
    if hit {
        POINTER_BOUND_POINTS
    } else {
        0
    }
}

fn parse_hex(value: &str) -> Option<u64> {
    let digits = value.trim_start_matches("0x").replace('`', "");
    u64::from_str_radix(&digits, 16).ok()
}

/// Rate how much a register value looks like a repeated fill pattern.
///
/// Only 8 or 16 character values are rated. Each distinct non-`00` byte pair
/// that occurs more than once in the value adds `2^count`; the total is halved.
/// Occurrences are counted as non-overlapping substrings of the whole value,
/// so a pair straddling two byte boundaries also counts.
pub fn byte_repetition_rating(value: &str) -> u64 {
    if !value.is_ascii() || !(value.len() == 8 || value.len() == 16) {
        trace!(value, "value can not be rated for cyclic patterns");
        return 0;
    }

    let pairs: BTreeSet<&str> = (0..value.len())
        .step_by(2)
        .map(|i| &value[i..i + 2])
        .filter(|pair| *pair != "00")
        .collect();

    let weight: u64 = pairs
        .into_iter()
        .map(|pair| value.matches(pair).count() as u32)
        .filter(|count| *count > 1)
        .map(|count| 2u64.pow(count))
        .sum();

    weight / 2
}

/// Whether the top of the stack hints at a corrupted return address.
///
/// True when the top frame is unresolved, or when its `+0x` offset is at
/// least [`LARGE_FRAME_OFFSET`]. An empty stack is not flagged.
pub fn has_stack_corruption(stack_trace: &[StackFrame]) -> bool {
    match stack_trace.first() {
        None => false,
        Some(StackFrame::Unknown) => true,
        Some(StackFrame::Symbol(text)) => {
            frame_offset(text).is_some_and(|offset| offset >= LARGE_FRAME_OFFSET)
        }
    }
}

/// Hex offset following `+0x` in a frame such as `module!func+0x1f`.
///
/// Offsets too wide for `u64` saturate, which still reads as implausibly large.
pub fn frame_offset(frame: &str) -> Option<u64> {
    let digits = FRAME_OFFSET.captures(frame)?.get(1)?.as_str();
    Some(u64::from_str_radix(digits, 16).unwrap_or(u64::MAX))
}
