//! Corpus-wide views over parsed crash records.
//!
//! Two independent orderings of the same records: grouped by faulting address,
//! and ranked by score. Neither view mutates or reorders the input slice.

use std::fmt::Write as _;

use serde::Serialize;

use crate::analysis::{group_by_address, score, CrashGroup};
use crate::model::{CrashRecord, ExploitabilityTag};

/// Serializable form of one address group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    pub address: String,
    pub instruction: String,
    pub count: usize,
    pub members: Vec<String>,
}

impl From<&CrashGroup<'_>> for GroupView {
    fn from(group: &CrashGroup<'_>) -> Self {
        Self {
            address: group.address.clone(),
            instruction: group.header().to_string(),
            count: group.len(),
            members: group.members.iter().map(|r| r.source.display().to_string()).collect(),
        }
    }
}

/// Serializable form of one ranked record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedView {
    pub score: u64,
    pub path: String,
    pub crash_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exploitability: Option<ExploitabilityTag>,
}

/// Records paired with their score, highest first; ties keep input order.
pub fn rank_by_score(records: &[CrashRecord]) -> Vec<(u64, &CrashRecord)> {
    let mut ranked: Vec<(u64, &CrashRecord)> = records.iter().map(|r| (score(r), r)).collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked
}

pub fn group_views(records: &[CrashRecord]) -> Vec<GroupView> {
    group_by_address(records).iter().map(GroupView::from).collect()
}

pub fn ranked_views(records: &[CrashRecord]) -> Vec<RankedView> {
    rank_by_score(records)
        .into_iter()
        .map(|(score, record)| RankedView {
            score,
            path: record.source.display().to_string(),
            crash_address: record.crash_address.clone(),
            exploitability: record.exploitability,
        })
        .collect()
}

/// Text view: each group's instruction line, then its member paths indented.
pub fn render_by_address(records: &[CrashRecord]) -> String {
    let mut out = String::new();
    for group in group_by_address(records) {
        let _ = writeln!(out, "{}:", group.header());
        for member in &group.members {
            let _ = writeln!(out, "  {}", member.source.display());
        }
    }
    out
}

/// Text view: `(score) path`, highest score first.
pub fn render_by_score(records: &[CrashRecord]) -> String {
    let mut out = String::new();
    for (score, record) in rank_by_score(records) {
        let _ = writeln!(out, "({}) {}", score, record.source.display());
    }
    out
}
