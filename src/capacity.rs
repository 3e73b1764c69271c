//! Per-run ledger of team capacity.
//!
//! Built from caller-supplied capacities at the start of every run and owned
//! by the orchestrator for that run only. Remaining hours never exceed the
//! member's capacity and never drop below zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{TaskList, TeamMember, DEFAULT_ROLE};

/// Members with strictly less remaining capacity than this are flagged.
pub const LOW_CAPACITY_THRESHOLD_HOURS: f64 = 10.0;

/// Capacity and remaining hours for one member.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityEntry {
    pub capacity: f64,
    pub remaining: f64,
}

impl CapacityEntry {
    pub fn new(capacity: f64) -> Self {
        let capacity = capacity.max(0.0);
        Self {
            capacity,
            remaining: capacity,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacityLedger {
    entries: BTreeMap<String, CapacityEntry>,
}

impl CapacityLedger {
    /// Reset the ledger to `capacities`, every member fully available.
    pub fn from_capacities<I, S>(capacities: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            entries: capacities
                .into_iter()
                .map(|(name, hours)| (name.into(), CapacityEntry::new(hours)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, member: &str) -> Option<&CapacityEntry> {
        self.entries.get(member)
    }

    pub fn remaining(&self, member: &str) -> Option<f64> {
        self.entries.get(member).map(|e| e.remaining)
    }

    /// Debit `hours` from a known member. Unknown members are ignored.
    pub fn record_assignment(&mut self, member: &str, hours: f64) -> bool {
        match self.entries.get_mut(member) {
            Some(entry) => {
                entry.remaining = (entry.remaining - hours.max(0.0)).max(0.0);
                true
            }
            None => {
                log::debug!("capacity: no ledger entry for assignee '{}'", member);
                false
            }
        }
    }

    /// Debit every assigned task's maximum estimate from its assignee.
    pub fn deplete_for(&mut self, tasks: &TaskList) {
        for task in tasks {
            if let Some(assignee) = task.task_assignee.as_deref() {
                self.record_assignment(assignee, task.time_estimate.maximum_hours);
            }
        }
    }

    /// Remaining hours per member, as handed to the task agent.
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.remaining))
            .collect()
    }

    /// Ledger as [`TeamMember`] records, counting tasks assigned in `tasks`.
    pub fn team_members(&self, tasks: &TaskList) -> Vec<TeamMember> {
        self.entries
            .iter()
            .map(|(name, entry)| {
                let assigned = tasks
                    .iter()
                    .filter(|t| t.task_assignee.as_deref() == Some(name.as_str()))
                    .count();
                TeamMember {
                    name: name.clone(),
                    role: DEFAULT_ROLE.to_string(),
                    current_tasks: assigned as u32,
                    capacity: entry.capacity,
                    remaining_capacity: entry.remaining,
                }
            })
            .collect()
    }

    /// `"{member}: {hours}hrs remaining"` for every member under the threshold.
    pub fn low_capacity_alerts(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.remaining < LOW_CAPACITY_THRESHOLD_HOURS)
            .map(|(name, entry)| format!("{}: {}hrs remaining", name, entry.remaining))
            .collect()
    }
}
