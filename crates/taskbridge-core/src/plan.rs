//! The sync plan: a deterministic value describing every mutation a run
//! would perform.
//!
//! Dry-run prints the plan; apply consumes it. Ordering is part of the
//! contract so the two outputs stay line-for-line comparable: updates
//! before creates before deletes, and `(store, id)` order inside each
//! category.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::types::{
    FieldValue, ListId, ObsTaskId, Priority, RemTaskId, SyncField, SyncLink, TaskStatus,
};

/// A single field edit carried by an update operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: SyncField,
    pub value: FieldValue,
}

/// The payload of a cross-store create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub description: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<chrono::NaiveDate>,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

/// One operation of a sync plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlanOp {
    UpdateObsidian {
        id: ObsTaskId,
        changes: Vec<FieldChange>,
    },
    UpdateReminder {
        id: RemTaskId,
        changes: Vec<FieldChange>,
    },
    CreateObsidian {
        source_rem_id: RemTaskId,
        file: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        heading: Option<String>,
        fields: NewTask,
    },
    CreateReminder {
        source_obs_id: ObsTaskId,
        list_id: ListId,
        fields: NewTask,
    },
    DeleteObsidian {
        id: ObsTaskId,
    },
    DeleteReminder {
        id: RemTaskId,
    },
}

impl PlanOp {
    /// Updates < creates < deletes.
    fn category(&self) -> u8 {
        match self {
            Self::UpdateObsidian { .. } | Self::UpdateReminder { .. } => 0,
            Self::CreateObsidian { .. } | Self::CreateReminder { .. } => 1,
            Self::DeleteObsidian { .. } | Self::DeleteReminder { .. } => 2,
        }
    }

    /// Obsidian sorts before Reminders within a category.
    fn store(&self) -> u8 {
        match self {
            Self::UpdateObsidian { .. }
            | Self::CreateObsidian { .. }
            | Self::DeleteObsidian { .. } => 0,
            Self::UpdateReminder { .. }
            | Self::CreateReminder { .. }
            | Self::DeleteReminder { .. } => 1,
        }
    }

    /// The id the op is keyed on (the source id for creates).
    fn sort_id(&self) -> &str {
        match self {
            Self::UpdateObsidian { id, .. } | Self::DeleteObsidian { id } => id.as_str(),
            Self::UpdateReminder { id, .. } | Self::DeleteReminder { id } => id.as_str(),
            Self::CreateObsidian { source_rem_id, .. } => source_rem_id.as_str(),
            Self::CreateReminder { source_obs_id, .. } => source_obs_id.as_str(),
        }
    }

    /// Short human-readable label used in reports.
    pub fn describe(&self) -> String {
        match self {
            Self::UpdateObsidian { id, changes } => {
                format!("update obsidian {} ({} fields)", id, changes.len())
            }
            Self::UpdateReminder { id, changes } => {
                format!("update reminder {} ({} fields)", id, changes.len())
            }
            Self::CreateObsidian {
                source_rem_id,
                file,
                ..
            } => format!("create obsidian task in {} (from {})", file, source_rem_id),
            Self::CreateReminder {
                source_obs_id,
                list_id,
                ..
            } => format!("create reminder in {} (from {})", list_id, source_obs_id),
            Self::DeleteObsidian { id } => format!("delete obsidian {}", id),
            Self::DeleteReminder { id } => format!("delete reminder {}", id),
        }
    }
}

/// Counts per plan category, for the report summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCounts {
    pub updates: usize,
    pub creates_to_reminders: usize,
    pub creates_to_obsidian: usize,
    pub deletes: usize,
}

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("plan inconsistency: obsidian id {0} appears on two links")]
    DuplicateObsId(ObsTaskId),
    #[error("plan inconsistency: reminder id {0} appears on two links")]
    DuplicateRemId(RemTaskId),
}

/// The full plan for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub ops: Vec<PlanOp>,
}

impl SyncPlan {
    pub fn push(&mut self, op: PlanOp) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Brings the plan into its canonical order.
    pub fn sort(&mut self) {
        self.ops.sort_by(|a, b| {
            (a.category(), a.store(), a.sort_id()).cmp(&(b.category(), b.store(), b.sort_id()))
        });
    }

    pub fn counts(&self) -> PlanCounts {
        let mut counts = PlanCounts::default();
        for op in &self.ops {
            match op {
                PlanOp::UpdateObsidian { .. } | PlanOp::UpdateReminder { .. } => {
                    counts.updates += 1;
                }
                PlanOp::CreateReminder { .. } => counts.creates_to_reminders += 1,
                PlanOp::CreateObsidian { .. } => counts.creates_to_obsidian += 1,
                PlanOp::DeleteObsidian { .. } | PlanOp::DeleteReminder { .. } => {
                    counts.deletes += 1;
                }
            }
        }
        counts
    }
}

/// Checks the 1:1 invariant over a prospective link set.
pub fn validate_links(links: &[SyncLink]) -> Result<(), PlanError> {
    let mut obs_seen = HashSet::new();
    let mut rem_seen = HashSet::new();
    for link in links {
        if !obs_seen.insert(&link.obs_id) {
            return Err(PlanError::DuplicateObsId(link.obs_id.clone()));
        }
        if !rem_seen.insert(&link.rem_id) {
            return Err(PlanError::DuplicateRemId(link.rem_id.clone()));
        }
    }
    Ok(())
}
