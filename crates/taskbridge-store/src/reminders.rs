//! The macOS Reminders gateway.
//!
//! The host calendar store is driven through `osascript` running JXA
//! snippets that exchange JSON on stdout. Tags ride in a delimiter block
//! at the tail of the reminder body (`---` line, then `tags: #a #b`);
//! the gateway strips the block on read and rebuilds it on write, so the
//! engine only ever sees clean notes plus a tag list.
//!
//! Date strings cross the subprocess boundary as ISO 8601 but are parsed
//! here, once, into native datetimes.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use taskbridge_core::{
    FieldChange, FieldValue, ListId, NewTask, Priority, RemTaskId, ReminderTask, SyncField,
    TaskStatus, Timestamp,
};

use crate::managers::{ManagerError, RemindersGateway, Result};

const TAG_MARKER: &str = "---\ntags: ";

pub struct OsascriptGateway {
    timeout: Duration,
}

impl OsascriptGateway {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn run_script(&self, script: &str) -> Result<String> {
        let mut child = Command::new("osascript")
            .args(["-l", "JavaScript", "-e", script])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain the pipes off-thread so a chatty script cannot deadlock
        // against a full pipe buffer while we poll for exit.
        let mut stdout_pipe = child.stdout.take().expect("piped stdout");
        let mut stderr_pipe = child.stderr.take().expect("piped stderr");
        let stdout_handle = std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stdout_pipe.read_to_string(&mut buf);
            buf
        });
        let stderr_handle = std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr_pipe.read_to_string(&mut buf);
            buf
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ManagerError::Timeout(self.timeout.as_secs()));
                }
                None => std::thread::sleep(Duration::from_millis(50)),
            }
        };

        let stdout = stdout_handle.join().unwrap_or_default();
        let stderr = stderr_handle.join().unwrap_or_default();

        if !status.success() {
            if stderr.contains("-1743") || stderr.to_lowercase().contains("not authorized") {
                return Err(ManagerError::Authorization);
            }
            if let Some(rest) = stderr.split("unknown list: ").nth(1) {
                let list = rest.split_whitespace().next().unwrap_or("").to_string();
                return Err(ManagerError::UnknownList(ListId::from(list)));
            }
            return Err(ManagerError::Protocol(stderr.trim().to_string()));
        }
        Ok(stdout.trim().to_string())
    }
}

/// The wire shape produced by the list script.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReminder {
    id: String,
    list_id: String,
    list_name: String,
    title: String,
    #[serde(default)]
    notes: String,
    completed: bool,
    due_date: Option<String>,
    #[serde(default)]
    priority: i64,
    creation_date: Option<String>,
    modification_date: Option<String>,
}

fn native_timestamp(raw: Option<&str>) -> Timestamp {
    match raw {
        None => Timestamp::Absent,
        Some(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(t) => Timestamp::Native(t.with_timezone(&Utc)),
            Err(_) => {
                tracing::warn!(value = %s, "unparseable gateway date treated as absent");
                Timestamp::Absent
            }
        },
    }
}

impl RawReminder {
    fn into_task(self) -> ReminderTask {
        let (notes, tags) = decode_notes(&self.notes);
        ReminderTask {
            id: RemTaskId::from(self.id),
            list_id: ListId::from(self.list_id),
            list_name: self.list_name,
            title: self.title,
            status: if self.completed {
                TaskStatus::Done
            } else {
                TaskStatus::Todo
            },
            due: self
                .due_date
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc).date_naive()),
            priority: Priority::from_reminders_value(self.priority),
            tags,
            notes,
            created_at: native_timestamp(self.creation_date.as_deref()),
            modified_at: native_timestamp(self.modification_date.as_deref()),
        }
    }
}

/// Appends the tag block to free-text notes for storage in the body.
pub(crate) fn encode_notes(notes: &str, tags: &[String]) -> String {
    if tags.is_empty() {
        return notes.to_string();
    }
    let tag_line = tags
        .iter()
        .map(|t| format!("#{t}"))
        .collect::<Vec<_>>()
        .join(" ");
    if notes.is_empty() {
        format!("{TAG_MARKER}{tag_line}")
    } else {
        format!("{notes}\n{TAG_MARKER}{tag_line}")
    }
}

/// Splits a stored body into free-text notes and the tag list.
pub(crate) fn decode_notes(body: &str) -> (String, Vec<String>) {
    let (notes, tag_line) = if let Some(rest) = body.strip_prefix(TAG_MARKER) {
        (String::new(), Some(rest))
    } else if let Some(idx) = body.rfind(&format!("\n{TAG_MARKER}")) {
        (
            body[..idx].to_string(),
            Some(&body[idx + 1 + TAG_MARKER.len()..]),
        )
    } else {
        (body.to_string(), None)
    };

    let tags = tag_line
        .map(|line| {
            line.split_whitespace()
                .map(|t| t.trim_start_matches('#').to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();
    (notes, tags)
}

fn json_string(value: &str) -> String {
    serde_json::to_string(value).expect("string serializes")
}

pub(crate) fn list_script(lists: &[ListId]) -> String {
    let ids = serde_json::to_string(&lists.iter().map(|l| l.as_str()).collect::<Vec<_>>())
        .expect("ids serialize");
    format!(
        r#"(() => {{
  const wanted = {ids};
  const app = Application("Reminders");
  const out = [];
  for (const list of app.lists()) {{
    const listId = list.id();
    if (wanted.length && wanted.indexOf(listId) < 0) continue;
    for (const r of list.reminders()) {{
      out.push({{
        id: r.id(),
        listId: listId,
        listName: list.name(),
        title: r.name(),
        notes: r.body() || "",
        completed: r.completed(),
        dueDate: r.dueDate() ? r.dueDate().toISOString() : null,
        priority: r.priority() || 0,
        creationDate: r.creationDate() ? r.creationDate().toISOString() : null,
        modificationDate: r.modificationDate() ? r.modificationDate().toISOString() : null,
      }});
    }}
  }}
  return JSON.stringify(out);
}})()"#
    )
}

pub(crate) fn create_script(list: &ListId, fields: &NewTask) -> String {
    let spec = serde_json::json!({
        "listId": list.as_str(),
        "name": fields.description,
        "body": encode_notes(&fields.notes, &fields.tags),
        "dueDate": fields.due.map(|d| format!("{}T00:00:00", d.format("%Y-%m-%d"))),
        "priority": fields.priority.to_reminders_value(),
        "completed": fields.status == TaskStatus::Done,
    });
    format!(
        r#"(() => {{
  const spec = {spec};
  const app = Application("Reminders");
  const lists = app.lists.whose({{ id: spec.listId }})();
  if (lists.length === 0) throw new Error("unknown list: " + spec.listId);
  const props = {{ name: spec.name }};
  if (spec.body) props.body = spec.body;
  if (spec.dueDate) props.dueDate = new Date(spec.dueDate);
  if (spec.priority) props.priority = spec.priority;
  if (spec.completed) props.completed = true;
  const r = app.Reminder(props);
  lists[0].reminders.push(r);
  return r.id();
}})()"#
    )
}

pub(crate) fn update_script(id: &RemTaskId, changes: &[FieldChange]) -> String {
    let mut payload = serde_json::Map::new();
    for change in changes {
        match (&change.field, &change.value) {
            (SyncField::Description, FieldValue::Text(text)) => {
                payload.insert("name".into(), serde_json::json!(text));
            }
            (SyncField::Status, FieldValue::Status(status)) => {
                payload.insert(
                    "completed".into(),
                    serde_json::json!(*status == TaskStatus::Done),
                );
            }
            (SyncField::Due, FieldValue::Due(due)) => {
                payload.insert(
                    "dueDate".into(),
                    serde_json::json!(due.map(|d| format!("{}T00:00:00", d.format("%Y-%m-%d")))),
                );
            }
            (SyncField::Priority, FieldValue::Priority(priority)) => {
                payload.insert(
                    "priority".into(),
                    serde_json::json!(priority.to_reminders_value()),
                );
            }
            (SyncField::Tags, FieldValue::Tags(tags)) => {
                payload.insert("tags".into(), serde_json::json!(tags));
            }
            (SyncField::Notes, FieldValue::Text(notes)) => {
                payload.insert("notes".into(), serde_json::json!(notes));
            }
            (field, value) => {
                tracing::warn!(?field, ?value, "mismatched field change ignored");
            }
        }
    }
    let changes_json = serde_json::Value::Object(payload);
    let id_json = json_string(id.as_str());
    format!(
        r##"(() => {{
  const changes = {changes_json};
  const marker = "---\ntags: ";
  const app = Application("Reminders");
  const r = app.reminders.byId({id_json});
  if ("name" in changes) r.name = changes.name;
  if ("completed" in changes) r.completed = changes.completed;
  if ("dueDate" in changes) r.dueDate = changes.dueDate === null ? null : new Date(changes.dueDate);
  if ("priority" in changes) r.priority = changes.priority;
  if ("tags" in changes || "notes" in changes) {{
    const current = r.body() || "";
    let notes = current;
    let tagLine = "";
    if (current.startsWith(marker)) {{
      notes = "";
      tagLine = current.slice(marker.length);
    }} else {{
      const idx = current.lastIndexOf("\n" + marker);
      if (idx >= 0) {{
        notes = current.slice(0, idx);
        tagLine = current.slice(idx + 1 + marker.length);
      }}
    }}
    let tags = tagLine.split(/\s+/).filter(t => t.length);
    if ("notes" in changes) notes = changes.notes;
    if ("tags" in changes) tags = changes.tags.map(t => "#" + t);
    let body = notes;
    if (tags.length) body = (notes ? notes + "\n" : "") + marker + tags.join(" ");
    r.body = body;
  }}
  return "ok";
}})()"##
    )
}

pub(crate) fn delete_script(id: &RemTaskId) -> String {
    let id_json = json_string(id.as_str());
    format!(
        r#"(() => {{
  const app = Application("Reminders");
  app.delete(app.reminders.byId({id_json}));
  return "ok";
}})()"#
    )
}

impl RemindersGateway for OsascriptGateway {
    fn list_reminders(&mut self, lists: &[ListId]) -> Result<Vec<ReminderTask>> {
        let output = self.run_script(&list_script(lists))?;
        let raw: Vec<RawReminder> = serde_json::from_str(&output)
            .map_err(|err| ManagerError::Protocol(err.to_string()))?;
        let mut tasks: Vec<ReminderTask> = raw.into_iter().map(RawReminder::into_task).collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tasks)
    }

    fn create_reminder(&mut self, list: &ListId, fields: &NewTask) -> Result<Option<RemTaskId>> {
        let output = self.run_script(&create_script(list, fields))?;
        if output.is_empty() {
            Ok(None)
        } else {
            Ok(Some(RemTaskId::from(output)))
        }
    }

    fn update_reminder(&mut self, id: &RemTaskId, changes: &[FieldChange]) -> Result<()> {
        self.run_script(&update_script(id, changes))?;
        Ok(())
    }

    fn delete_reminder(&mut self, id: &RemTaskId) -> Result<()> {
        self.run_script(&delete_script(id))?;
        Ok(())
    }
}
