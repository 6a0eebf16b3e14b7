//! In-memory managers for exercising the engine without a vault on disk
//! or a host calendar store. Used by the integration tests and handy for
//! downstream tooling that wants to dry-run plans against fixtures.

use std::collections::BTreeMap;

use taskbridge_core::{
    FieldChange, FieldValue, ListId, NewTask, ObsTaskId, ObsidianTask, Priority, RemTaskId,
    ReminderTask, SyncField, TaskStatus, Timestamp, VaultId,
};

use crate::managers::{ManagerError, ObsidianManager, RemindersGateway, Result};

/// A builder-ish constructor for Obsidian fixture tasks.
pub fn obs_task(id: &str, description: &str) -> ObsidianTask {
    ObsidianTask {
        id: ObsTaskId::from(id),
        vault_id: VaultId::from("test"),
        file: "Tasks.md".to_string(),
        line: 0,
        description: description.to_string(),
        status: TaskStatus::Todo,
        due: None,
        priority: Priority::None,
        tags: Vec::new(),
        notes: String::new(),
        created_at: Timestamp::Absent,
        modified_at: Timestamp::Absent,
    }
}

/// A builder-ish constructor for Reminders fixture tasks.
pub fn rem_task(id: &str, list: &str, title: &str) -> ReminderTask {
    ReminderTask {
        id: RemTaskId::from(id),
        list_id: ListId::from(list),
        list_name: list.to_string(),
        title: title.to_string(),
        status: TaskStatus::Todo,
        due: None,
        priority: Priority::None,
        tags: Vec::new(),
        notes: String::new(),
        created_at: Timestamp::Absent,
        modified_at: Timestamp::Absent,
    }
}

fn apply_field(
    field: &SyncField,
    value: &FieldValue,
    description: &mut String,
    status: &mut TaskStatus,
    due: &mut Option<chrono::NaiveDate>,
    priority: &mut Priority,
    tags: &mut Vec<String>,
    notes: &mut String,
) {
    match (field, value) {
        (SyncField::Description, FieldValue::Text(text)) => *description = text.clone(),
        (SyncField::Status, FieldValue::Status(s)) => *status = *s,
        (SyncField::Due, FieldValue::Due(d)) => *due = *d,
        (SyncField::Priority, FieldValue::Priority(p)) => *priority = *p,
        (SyncField::Tags, FieldValue::Tags(t)) => *tags = t.clone(),
        (SyncField::Notes, FieldValue::Text(text)) => *notes = text.clone(),
        _ => {}
    }
}

/// An in-memory Obsidian manager.
#[derive(Default)]
pub struct MemoryVault {
    tasks: BTreeMap<ObsTaskId, ObsidianTask>,
    counter: u32,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task: ObsidianTask) {
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn get(&self, id: &ObsTaskId) -> Option<&ObsidianTask> {
        self.tasks.get(id)
    }

    pub fn remove(&mut self, id: &ObsTaskId) -> Option<ObsidianTask> {
        self.tasks.remove(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl ObsidianManager for MemoryVault {
    fn list_tasks(&mut self, _vault: &VaultId) -> Result<Vec<ObsidianTask>> {
        Ok(self.tasks.values().cloned().collect())
    }

    fn update_task(&mut self, task: &ObsidianTask, changes: &[FieldChange]) -> Result<()> {
        let stored = self
            .tasks
            .get_mut(&task.id)
            .ok_or_else(|| ManagerError::NotFound(task.id.to_string()))?;
        for change in changes {
            apply_field(
                &change.field,
                &change.value,
                &mut stored.description,
                &mut stored.status,
                &mut stored.due,
                &mut stored.priority,
                &mut stored.tags,
                &mut stored.notes,
            );
        }
        Ok(())
    }

    fn create_task(
        &mut self,
        vault: &VaultId,
        file: &str,
        _heading: Option<&str>,
        fields: &NewTask,
    ) -> Result<ObsidianTask> {
        self.counter += 1;
        let task = ObsidianTask {
            id: ObsTaskId::from(format!("om-{:03}", self.counter)),
            vault_id: vault.clone(),
            file: file.to_string(),
            line: self.counter as usize,
            description: fields.description.clone(),
            status: fields.status,
            due: fields.due,
            priority: fields.priority,
            tags: fields.tags.clone(),
            notes: fields.notes.clone(),
            created_at: Timestamp::Absent,
            modified_at: Timestamp::Absent,
        };
        self.tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    fn delete_task(&mut self, task: &ObsidianTask) -> Result<()> {
        self.tasks
            .remove(&task.id)
            .map(|_| ())
            .ok_or_else(|| ManagerError::NotFound(task.id.to_string()))
    }
}

/// An in-memory Reminders gateway with failure injection for the
/// partial-apply paths.
#[derive(Default)]
pub struct MemoryReminders {
    lists: BTreeMap<ListId, String>,
    tasks: BTreeMap<RemTaskId, ReminderTask>,
    counter: u32,
    /// Every create fails with a timeout.
    pub fail_creates: bool,
    /// Creates succeed but report no id.
    pub create_without_id: bool,
}

impl MemoryReminders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_list(&mut self, id: &str, name: &str) {
        self.lists.insert(ListId::from(id), name.to_string());
    }

    pub fn insert(&mut self, task: ReminderTask) {
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn get(&self, id: &RemTaskId) -> Option<&ReminderTask> {
        self.tasks.get(id)
    }

    pub fn remove(&mut self, id: &RemTaskId) -> Option<ReminderTask> {
        self.tasks.remove(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl RemindersGateway for MemoryReminders {
    fn list_reminders(&mut self, lists: &[ListId]) -> Result<Vec<ReminderTask>> {
        Ok(self
            .tasks
            .values()
            .filter(|t| lists.contains(&t.list_id))
            .cloned()
            .collect())
    }

    fn create_reminder(&mut self, list: &ListId, fields: &NewTask) -> Result<Option<RemTaskId>> {
        if self.fail_creates {
            return Err(ManagerError::Timeout(300));
        }
        let list_name = self
            .lists
            .get(list)
            .cloned()
            .ok_or_else(|| ManagerError::UnknownList(list.clone()))?;
        self.counter += 1;
        let task = ReminderTask {
            id: RemTaskId::from(format!("rm-{:03}", self.counter)),
            list_id: list.clone(),
            list_name,
            title: fields.description.clone(),
            status: fields.status,
            due: fields.due,
            priority: fields.priority,
            tags: fields.tags.clone(),
            notes: fields.notes.clone(),
            created_at: Timestamp::Absent,
            modified_at: Timestamp::Absent,
        };
        let id = task.id.clone();
        self.tasks.insert(id.clone(), task);
        if self.create_without_id {
            Ok(None)
        } else {
            Ok(Some(id))
        }
    }

    fn update_reminder(&mut self, id: &RemTaskId, changes: &[FieldChange]) -> Result<()> {
        let stored = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))?;
        for change in changes {
            apply_field(
                &change.field,
                &change.value,
                &mut stored.title,
                &mut stored.status,
                &mut stored.due,
                &mut stored.priority,
                &mut stored.tags,
                &mut stored.notes,
            );
        }
        Ok(())
    }

    fn delete_reminder(&mut self, id: &RemTaskId) -> Result<()> {
        self.tasks
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))
    }
}
