//! Round-trip codec for Obsidian task lines.
//!
//! A task line looks like:
//!
//! ```text
//! - [ ] Write report #work ⏫ 📅 2025-01-15 ^tb-a1b2c3
//! ```
//!
//! Parsing pulls the metadata tokens out of the text so `description`
//! holds only the human wording; rendering re-emits the tokens in a
//! fixed order so a parse→render cycle is stable.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use taskbridge_core::{Priority, TaskStatus};

static TASK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<indent>\s*)[-*+] \[(?P<state>.)\] (?P<rest>.*)$").expect("task regex")
});
static BLOCK_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\^(?P<id>[A-Za-z0-9][A-Za-z0-9-]*)\s*$").expect("id regex"));
static DUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"📅\s*(?P<date>\d{4}-\d{2}-\d{2})").expect("due regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(?P<tag>[A-Za-z][A-Za-z0-9_/-]*)").expect("tag regex"));

const PRIORITY_HIGH: &str = "⏫";
const PRIORITY_MEDIUM: &str = "🔼";
const PRIORITY_LOW: &str = "🔽";

/// The parsed form of a single Markdown task line.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskLine {
    pub indent: String,
    pub status: TaskStatus,
    pub description: String,
    pub due: Option<NaiveDate>,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub block_id: Option<String>,
}

impl TaskLine {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            indent: String::new(),
            status: TaskStatus::Todo,
            description: description.into(),
            due: None,
            priority: Priority::None,
            tags: Vec::new(),
            block_id: None,
        }
    }
}

/// Parses one line; `None` when the line is not a task.
pub fn parse_task_line(line: &str) -> Option<TaskLine> {
    let caps = TASK_RE.captures(line)?;
    let indent = caps["indent"].to_string();
    let status = match &caps["state"] {
        "x" | "X" => TaskStatus::Done,
        _ => TaskStatus::Todo,
    };
    let mut rest = caps["rest"].to_string();

    let block_id = BLOCK_ID_RE.captures(&rest).map(|c| c["id"].to_string());
    if block_id.is_some() {
        rest = BLOCK_ID_RE.replace(&rest, "").into_owned();
    }

    let due = DUE_RE
        .captures(&rest)
        .and_then(|c| NaiveDate::parse_from_str(&c["date"], "%Y-%m-%d").ok());
    if due.is_some() {
        rest = DUE_RE.replace_all(&rest, "").into_owned();
    }

    let priority = if rest.contains(PRIORITY_HIGH) {
        Priority::High
    } else if rest.contains(PRIORITY_MEDIUM) {
        Priority::Medium
    } else if rest.contains(PRIORITY_LOW) {
        Priority::Low
    } else {
        Priority::None
    };
    for marker in [PRIORITY_HIGH, PRIORITY_MEDIUM, PRIORITY_LOW] {
        rest = rest.replace(marker, " ");
    }

    let mut tags = Vec::new();
    for caps in TAG_RE.captures_iter(&rest) {
        let tag = caps["tag"].to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    rest = TAG_RE.replace_all(&rest, "").into_owned();

    let description = rest.split_whitespace().collect::<Vec<_>>().join(" ");

    Some(TaskLine {
        indent,
        status,
        description,
        due,
        priority,
        tags,
        block_id,
    })
}

/// Renders a task back to its Markdown line.
pub fn render_task_line(task: &TaskLine) -> String {
    let mut line = format!(
        "{}- [{}] {}",
        task.indent,
        match task.status {
            TaskStatus::Todo => ' ',
            TaskStatus::Done => 'x',
        },
        task.description,
    );
    for tag in &task.tags {
        line.push_str(" #");
        line.push_str(tag);
    }
    match task.priority {
        Priority::None => {}
        Priority::High => {
            line.push(' ');
            line.push_str(PRIORITY_HIGH);
        }
        Priority::Medium => {
            line.push(' ');
            line.push_str(PRIORITY_MEDIUM);
        }
        Priority::Low => {
            line.push(' ');
            line.push_str(PRIORITY_LOW);
        }
    }
    if let Some(due) = task.due {
        line.push_str(&format!(" 📅 {}", due.format("%Y-%m-%d")));
    }
    if let Some(id) = &task.block_id {
        line.push_str(&format!(" ^{id}"));
    }
    line
}
