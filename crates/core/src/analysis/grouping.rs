use std::collections::HashMap;

use crate::model::CrashRecord;

/// Records sharing one faulting instruction address, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashGroup<'a> {
    pub address: String,
    pub members: Vec<&'a CrashRecord>,
}

impl<'a> CrashGroup<'a> {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Instruction line of the first member, used as the group header.
    pub fn header(&self) -> &str {
        self.members.first().map(|r| r.instruction_line.as_str()).unwrap_or_default()
    }
}

/// Group records by crash address, largest group first.
///
/// Groups of equal size keep the order in which their address was first seen.
pub fn group_by_address(records: &[CrashRecord]) -> Vec<CrashGroup<'_>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<CrashGroup<'_>> = Vec::new();

    for record in records {
        match index.get(record.crash_address.as_str()) {
            Some(&slot) => groups[slot].members.push(record),
            None => {
                index.insert(record.crash_address.as_str(), groups.len());
                groups.push(CrashGroup {
                    address: record.crash_address.clone(),
                    members: vec![record],
                });
            }
        }
    }

    groups.sort_by(|a, b| b.len().cmp(&a.len()));
    groups
}
