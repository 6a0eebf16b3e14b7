//! The Markdown vault manager.
//!
//! Tasks live as checkbox lines in the vault's `.md` files; note text is
//! the run of deeper-indented non-task lines directly below a task. Every
//! mutation is a read-modify-write of one file with an atomic temp-file
//! rename. Tasks found without a `^block-id` anchor are assigned one and
//! written back during the snapshot, so every task the engine sees has a
//! stable id.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use taskbridge_core::{
    FieldChange, FieldValue, NewTask, ObsTaskId, ObsidianTask, SyncField, Timestamp, VaultId,
};

use crate::managers::{ManagerError, ObsidianManager, Result};
use crate::markdown::{TaskLine, parse_task_line, render_task_line};

const NOTE_INDENT: &str = "  ";

/// Directory names never scanned for tasks.
const IGNORED_DIRS: &[&str] = &[".obsidian", ".trash", ".git"];

pub struct MarkdownVault {
    root: PathBuf,
}

impl MarkdownVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Vault-relative markdown files in stable (sorted) order.
    fn markdown_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| !IGNORED_DIRS.contains(&name))
                    .unwrap_or(true)
            });
        for entry in walker {
            let entry = entry.map_err(|err| {
                ManagerError::Io(err.into_io_error().unwrap_or_else(|| {
                    std::io::Error::other("walkdir loop")
                }))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let rel = path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push((rel, path.to_path_buf()));
        }
        Ok(files)
    }

    fn read_lines(path: &Path) -> Result<Vec<String>> {
        let raw = fs::read_to_string(path)?;
        Ok(raw.lines().map(str::to_string).collect())
    }

    fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let mut content = lines.join("\n");
        content.push('\n');
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, content.as_bytes())?;
        tmp.persist(path).map_err(|err| ManagerError::Io(err.error))?;
        Ok(())
    }

    fn file_timestamp(path: &Path) -> Timestamp {
        match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(mtime) => {
                let dt: DateTime<Utc> = mtime.into();
                Timestamp::Iso(dt.to_rfc3339())
            }
            Err(_) => Timestamp::Absent,
        }
    }

    /// Snapshots one file, assigning block ids where missing.
    fn snapshot_file(
        &self,
        vault: &VaultId,
        rel: &str,
        path: &Path,
    ) -> Result<Vec<ObsidianTask>> {
        let mut lines = Self::read_lines(path)?;

        let mut assigned_any = false;
        for line in lines.iter_mut() {
            if let Some(mut task) = parse_task_line(line)
                && task.block_id.is_none()
            {
                task.block_id = Some(new_block_id());
                *line = render_task_line(&task);
                assigned_any = true;
            }
        }
        if assigned_any {
            Self::write_lines(path, &lines)?;
        }

        let stamp = Self::file_timestamp(path);
        let mut tasks = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            let Some(parsed) = parse_task_line(line) else {
                continue;
            };
            let id = parsed
                .block_id
                .clone()
                .expect("block ids assigned above");
            tasks.push(ObsidianTask {
                id: ObsTaskId::from(id),
                vault_id: vault.clone(),
                file: rel.to_string(),
                line: index,
                description: parsed.description,
                status: parsed.status,
                due: parsed.due,
                priority: parsed.priority,
                tags: parsed.tags,
                notes: collect_notes(&lines, index, &parsed.indent),
                created_at: stamp.clone(),
                modified_at: stamp.clone(),
            });
        }
        Ok(tasks)
    }

    /// Finds the line index of the task carrying `id`, preferring the
    /// snapshot's line hint before scanning the whole file.
    fn locate(lines: &[String], id: &ObsTaskId, hint: usize) -> Option<usize> {
        let id_matches = |line: &str| {
            parse_task_line(line)
                .and_then(|t| t.block_id)
                .is_some_and(|b| b == id.as_str())
        };
        if let Some(line) = lines.get(hint)
            && id_matches(line)
        {
            return Some(hint);
        }
        lines.iter().position(|line| id_matches(line))
    }
}

fn new_block_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("tb-{}", &id[..6])
}

/// The note block below a task: the run of consecutive deeper-indented
/// non-task lines starting right under it.
fn note_span(lines: &[String], task_index: usize, task_indent: &str) -> std::ops::Range<usize> {
    let start = task_index + 1;
    let mut end = start;
    for line in lines.iter().skip(start) {
        if line.trim().is_empty() {
            break;
        }
        let indent = line.len() - line.trim_start().len();
        if indent <= task_indent.len() || parse_task_line(line).is_some() {
            break;
        }
        end += 1;
    }
    start..end
}

fn collect_notes(lines: &[String], task_index: usize, task_indent: &str) -> String {
    lines[note_span(lines, task_index, task_indent)]
        .iter()
        .map(|l| l.trim_start())
        .collect::<Vec<_>>()
        .join("\n")
}

fn note_line_count(lines: &[String], task_index: usize, task_indent: &str) -> usize {
    note_span(lines, task_index, task_indent).len()
}

fn apply_changes(parsed: &mut TaskLine, changes: &[FieldChange]) -> Option<String> {
    let mut notes_change = None;
    for change in changes {
        match (&change.field, &change.value) {
            (SyncField::Description, FieldValue::Text(text)) => {
                parsed.description = text.clone();
            }
            (SyncField::Status, FieldValue::Status(status)) => parsed.status = *status,
            (SyncField::Due, FieldValue::Due(due)) => parsed.due = *due,
            (SyncField::Priority, FieldValue::Priority(priority)) => {
                parsed.priority = *priority;
            }
            (SyncField::Tags, FieldValue::Tags(tags)) => parsed.tags = tags.clone(),
            (SyncField::Notes, FieldValue::Text(notes)) => notes_change = Some(notes.clone()),
            (field, value) => {
                tracing::warn!(?field, ?value, "mismatched field change ignored");
            }
        }
    }
    notes_change
}

impl ObsidianManager for MarkdownVault {
    fn list_tasks(&mut self, vault: &VaultId) -> Result<Vec<ObsidianTask>> {
        let mut tasks = Vec::new();
        for (rel, path) in self.markdown_files()? {
            tasks.extend(self.snapshot_file(vault, &rel, &path)?);
        }
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tasks)
    }

    fn update_task(&mut self, task: &ObsidianTask, changes: &[FieldChange]) -> Result<()> {
        let path = self.root.join(&task.file);
        let mut lines = Self::read_lines(&path)?;
        let index = Self::locate(&lines, &task.id, task.line)
            .ok_or_else(|| ManagerError::NotFound(task.id.to_string()))?;

        let mut parsed = parse_task_line(&lines[index]).expect("located line parses");
        let notes_change = apply_changes(&mut parsed, changes);
        lines[index] = render_task_line(&parsed);

        if let Some(notes) = notes_change {
            let old_count = note_line_count(&lines, index, &parsed.indent);
            let indent = format!("{}{}", parsed.indent, NOTE_INDENT);
            let new_lines: Vec<String> = notes
                .lines()
                .map(|l| format!("{indent}{l}"))
                .collect();
            lines.splice(index + 1..index + 1 + old_count, new_lines);
        }

        Self::write_lines(&path, &lines)
    }

    fn create_task(
        &mut self,
        vault: &VaultId,
        file: &str,
        heading: Option<&str>,
        fields: &NewTask,
    ) -> Result<ObsidianTask> {
        let path = self.root.join(file);
        let mut lines = if path.exists() {
            Self::read_lines(&path)?
        } else {
            Vec::new()
        };

        let id = new_block_id();
        let rendered = render_task_line(&TaskLine {
            indent: String::new(),
            status: fields.status,
            description: fields.description.clone(),
            due: fields.due,
            priority: fields.priority,
            tags: fields.tags.clone(),
            block_id: Some(id.clone()),
        });

        let insert_at = match heading {
            Some(heading) => match lines.iter().position(|l| l.trim() == heading.trim()) {
                Some(pos) => pos + 1,
                None => {
                    // Missing heading: append it, then the task below.
                    if !lines.is_empty() {
                        lines.push(String::new());
                    }
                    lines.push(heading.trim().to_string());
                    lines.len()
                }
            },
            None => lines.len(),
        };

        lines.insert(insert_at, rendered);
        let mut offset = 1;
        for note_line in fields.notes.lines() {
            lines.insert(insert_at + offset, format!("{NOTE_INDENT}{note_line}"));
            offset += 1;
        }

        Self::write_lines(&path, &lines)?;

        Ok(ObsidianTask {
            id: ObsTaskId::from(id),
            vault_id: vault.clone(),
            file: file.to_string(),
            line: insert_at,
            description: fields.description.clone(),
            status: fields.status,
            due: fields.due,
            priority: fields.priority,
            tags: fields.tags.clone(),
            notes: fields.notes.clone(),
            created_at: Self::file_timestamp(&path),
            modified_at: Self::file_timestamp(&path),
        })
    }

    fn delete_task(&mut self, task: &ObsidianTask) -> Result<()> {
        let path = self.root.join(&task.file);
        let mut lines = Self::read_lines(&path)?;
        let index = Self::locate(&lines, &task.id, task.line)
            .ok_or_else(|| ManagerError::NotFound(task.id.to_string()))?;

        let parsed = parse_task_line(&lines[index]).expect("located line parses");
        let notes = note_line_count(&lines, index, &parsed.indent);
        lines.drain(index..=index + notes);

        Self::write_lines(&path, &lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskbridge_core::{Priority, TaskStatus};

    fn vault_with(files: &[(&str, &str)]) -> (tempfile::TempDir, MarkdownVault) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
        }
        let vault = MarkdownVault::new(dir.path());
        (dir, vault)
    }

    fn vid() -> VaultId {
        VaultId::from("test")
    }

    #[test]
    fn test_list_assigns_block_ids_and_writes_back() {
        let (dir, mut vault) = vault_with(&[("Tasks.md", "- [ ] Buy milk 📅 2025-01-15\n")]);

        let tasks = vault.list_tasks(&vid()).unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].id.as_str().starts_with("tb-"));

        // The id must be durable: a second snapshot sees the same one.
        let rewritten = fs::read_to_string(dir.path().join("Tasks.md")).unwrap();
        assert!(rewritten.contains(&format!("^{}", tasks[0].id)));
        let again = vault.list_tasks(&vid()).unwrap();
        assert_eq!(again[0].id, tasks[0].id);
    }

    #[test]
    fn test_list_skips_ignored_dirs_and_collects_notes() {
        let (_dir, mut vault) = vault_with(&[
            (
                "Projects/Plan.md",
                "# Plan\n- [ ] Ship v2 ^tb-aaaaaa\n  staging first\n  then prod\n- [ ] Other ^tb-bbbbbb\n",
            ),
            (".obsidian/workspace.md", "- [ ] not a real task\n"),
        ]);

        let tasks = vault.list_tasks(&vid()).unwrap();
        assert_eq!(tasks.len(), 2);
        let ship = tasks.iter().find(|t| t.id.as_str() == "tb-aaaaaa").unwrap();
        assert_eq!(ship.notes, "staging first\nthen prod");
        assert_eq!(ship.file, "Projects/Plan.md");
    }

    #[test]
    fn test_update_rewrites_fields_in_place() {
        let (dir, mut vault) =
            vault_with(&[("Tasks.md", "- [ ] Buy milk #errand ^tb-aaaaaa\n- [ ] Keep ^tb-bbbbbb\n")]);
        let tasks = vault.list_tasks(&vid()).unwrap();
        let task = tasks.iter().find(|t| t.id.as_str() == "tb-aaaaaa").unwrap();

        vault
            .update_task(
                task,
                &[
                    FieldChange {
                        field: SyncField::Status,
                        value: FieldValue::Status(TaskStatus::Done),
                    },
                    FieldChange {
                        field: SyncField::Priority,
                        value: FieldValue::Priority(Priority::High),
                    },
                ],
            )
            .unwrap();

        let content = fs::read_to_string(dir.path().join("Tasks.md")).unwrap();
        assert!(content.contains("- [x] Buy milk #errand ⏫ ^tb-aaaaaa"));
        assert!(content.contains("- [ ] Keep ^tb-bbbbbb"));
    }

    #[test]
    fn test_update_relocates_after_line_drift() {
        let (_dir, mut vault) =
            vault_with(&[("Tasks.md", "- [ ] Buy milk ^tb-aaaaaa\n")]);
        let tasks = vault.list_tasks(&vid()).unwrap();
        let mut task = tasks[0].clone();
        task.line = 40; // stale hint

        vault
            .update_task(
                &task,
                &[FieldChange {
                    field: SyncField::Status,
                    value: FieldValue::Status(TaskStatus::Done),
                }],
            )
            .unwrap();
    }

    #[test]
    fn test_update_missing_task_is_not_found() {
        let (_dir, mut vault) = vault_with(&[("Tasks.md", "- [ ] Buy milk ^tb-aaaaaa\n")]);
        let tasks = vault.list_tasks(&vid()).unwrap();
        let mut ghost = tasks[0].clone();
        ghost.id = ObsTaskId::from("tb-zzzzzz");

        assert!(matches!(
            vault.update_task(&ghost, &[]),
            Err(ManagerError::NotFound(_))
        ));
    }

    #[test]
    fn test_create_under_heading_and_at_end() {
        let (dir, mut vault) =
            vault_with(&[("Inbox.md", "# Inbox\n\n- [ ] Existing ^tb-aaaaaa\n")]);

        let fields = NewTask {
            description: "From reminders".to_string(),
            status: TaskStatus::Todo,
            due: None,
            priority: Priority::None,
            tags: vec!["inbox".to_string()],
            notes: String::new(),
        };

        let created = vault
            .create_task(&vid(), "Inbox.md", Some("# Inbox"), &fields)
            .unwrap();
        let content = fs::read_to_string(dir.path().join("Inbox.md")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[1].contains("From reminders"));
        assert!(lines[1].contains(&format!("^{}", created.id)));

        // No heading: appended at the end of a fresh file.
        vault.create_task(&vid(), "New.md", None, &fields).unwrap();
        assert!(dir.path().join("New.md").exists());
    }

    #[test]
    fn test_delete_removes_task_and_notes() {
        let (dir, mut vault) = vault_with(&[(
            "Tasks.md",
            "- [ ] Doomed ^tb-aaaaaa\n  some note\n- [ ] Keep ^tb-bbbbbb\n",
        )]);
        let tasks = vault.list_tasks(&vid()).unwrap();
        let doomed = tasks.iter().find(|t| t.id.as_str() == "tb-aaaaaa").unwrap();

        vault.delete_task(doomed).unwrap();

        let content = fs::read_to_string(dir.path().join("Tasks.md")).unwrap();
        assert_eq!(content, "- [ ] Keep ^tb-bbbbbb\n");
    }
}
