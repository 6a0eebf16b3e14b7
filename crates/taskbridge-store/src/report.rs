//! The run report: what the engine decided, what happened when it was
//! applied, and everything a human needs to act on diagnostics.

use serde::Serialize;

use taskbridge_core::{PlanCounts, Side, SyncPlan, TaskStatus};

use crate::managers::ManagerError;

/// Failure classification for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Authorization,
    Configuration,
    Timeout,
    NotFound,
    Io,
    Protocol,
}

impl From<&ManagerError> for FailureKind {
    fn from(err: &ManagerError) -> Self {
        match err {
            ManagerError::Authorization => Self::Authorization,
            ManagerError::UnknownList(_) => Self::Configuration,
            ManagerError::Timeout(_) => Self::Timeout,
            ManagerError::NotFound(_) => Self::NotFound,
            ManagerError::Io(_) => Self::Io,
            ManagerError::Protocol(_) => Self::Protocol,
        }
    }
}

/// A recorded per-operation failure. The run continues past these.
#[derive(Debug, Clone, Serialize)]
pub struct OpFailure {
    pub op: String,
    pub kind: FailureKind,
    pub error: String,
}

/// Context for one member of a duplicate cluster.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterMember {
    pub id: String,
    /// `file:line` for Obsidian, the list name for Reminders.
    pub location: String,
    pub due: Option<chrono::NaiveDate>,
    pub status: TaskStatus,
}

/// A duplicate cluster surfaced for disposition.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterReport {
    pub store: Side,
    pub normalized: String,
    pub members: Vec<ClusterMember>,
}

/// The outcome of one engine run.
#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub vault_id: String,
    pub dry_run: bool,
    pub plan: SyncPlan,
    pub counts: PlanCounts,
    /// Operations applied successfully (0 in dry-run).
    pub applied: usize,
    pub failures: Vec<OpFailure>,
    pub dedup_clusters: Vec<ClusterReport>,
    pub diagnostics: Vec<String>,
    pub links_persisted: bool,
}

impl SyncReport {
    /// 0 clean, 1 partial apply (recorded failures or unsafe link state).
    pub fn exit_code(&self) -> i32 {
        if self.failures.is_empty() && self.links_persisted {
            0
        } else {
            1
        }
    }

    /// Human-readable rendering for the CLI.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mode = if self.dry_run { "dry-run" } else { "apply" };
        out.push_str(&format!("sync {} ({})\n", self.vault_id, mode));
        out.push_str(&format!(
            "  updates: {}  creates→reminders: {}  creates→obsidian: {}  deletes: {}\n",
            self.counts.updates,
            self.counts.creates_to_reminders,
            self.counts.creates_to_obsidian,
            self.counts.deletes,
        ));

        if !self.plan.ops.is_empty() {
            out.push_str("plan:\n");
            for op in &self.plan.ops {
                out.push_str(&format!("  {}\n", op.describe()));
            }
        }

        if !self.dry_run {
            out.push_str(&format!("applied: {}\n", self.applied));
        }

        if !self.failures.is_empty() {
            out.push_str("failures:\n");
            for failure in &self.failures {
                out.push_str(&format!(
                    "  {} [{:?}]: {}\n",
                    failure.op, failure.kind, failure.error
                ));
            }
        }

        if !self.dedup_clusters.is_empty() {
            out.push_str("duplicate clusters:\n");
            for cluster in &self.dedup_clusters {
                out.push_str(&format!(
                    "  {:?} \"{}\" ({} members)\n",
                    cluster.store,
                    cluster.normalized,
                    cluster.members.len()
                ));
                for member in &cluster.members {
                    out.push_str(&format!("    {} @ {}\n", member.id, member.location));
                }
            }
        }

        if !self.diagnostics.is_empty() {
            out.push_str("diagnostics:\n");
            for line in &self.diagnostics {
                out.push_str(&format!("  {line}\n"));
            }
        }

        out
    }
}
