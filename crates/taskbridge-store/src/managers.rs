//! The narrow seams between the engine and the two stores.
//!
//! The engine only ever sees these traits; the Markdown vault, the
//! osascript gateway, and the in-memory test managers all sit behind
//! them.

use thiserror::Error;

use taskbridge_core::{
    FieldChange, ListId, NewTask, ObsidianTask, RemTaskId, ReminderTask, VaultId,
};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("authorization denied by the host store")]
    Authorization,

    #[error("unknown list: {0}")]
    UnknownList(ListId),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("operation timed out after {0} s")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed gateway payload: {0}")]
    Protocol(String),
}

impl ManagerError {
    /// True for configuration-shaped failures (the operation was refused,
    /// not attempted).
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UnknownList(_))
    }
}

pub type Result<T> = std::result::Result<T, ManagerError>;

/// Snapshot and mutation access to a Markdown vault.
pub trait ObsidianManager {
    /// Snapshots every task in the vault. Tasks without a block id are
    /// assigned one and written back before the snapshot is returned.
    fn list_tasks(&mut self, vault: &VaultId) -> Result<Vec<ObsidianTask>>;

    /// Edits a task in place, re-locating it by block id first.
    fn update_task(&mut self, task: &ObsidianTask, changes: &[FieldChange]) -> Result<()>;

    /// Appends a new task to `file` (created if absent), optionally under
    /// `heading`, and returns the fresh snapshot with its assigned id.
    fn create_task(
        &mut self,
        vault: &VaultId,
        file: &str,
        heading: Option<&str>,
        fields: &NewTask,
    ) -> Result<ObsidianTask>;

    /// Removes the task line (and its note block) from its file.
    fn delete_task(&mut self, task: &ObsidianTask) -> Result<()>;
}

/// Access to the Reminders host store.
pub trait RemindersGateway {
    /// Fetches reminders from every list in `lists`. Callers pass the
    /// expanded query set; unknown ids yield no tasks rather than failing
    /// the whole snapshot.
    fn list_reminders(&mut self, lists: &[ListId]) -> Result<Vec<ReminderTask>>;

    /// Creates a reminder and returns the host store's id for it, when
    /// the host reports one.
    fn create_reminder(&mut self, list: &ListId, fields: &NewTask) -> Result<Option<RemTaskId>>;

    fn update_reminder(&mut self, id: &RemTaskId, changes: &[FieldChange]) -> Result<()>;

    fn delete_reminder(&mut self, id: &RemTaskId) -> Result<()>;
}
