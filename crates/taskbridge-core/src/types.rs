//! Core domain types for TaskBridge.
//!
//! Tasks are immutable snapshots taken from their backing stores at the
//! start of a run. Links are the only state the engine owns; they use
//! a stable serde layout because the link file is compared byte-for-byte
//! on rewrite.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of an Obsidian task (the `^block-id` anchor).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ObsTaskId(String);

/// Calendar-item identifier of a reminder in the host store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RemTaskId(String);

/// Identifier of an Obsidian vault as named in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct VaultId(String);

/// Identifier of a Reminders list (calendar container).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ListId(String);

macro_rules! string_id_impls {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id_impls!(ObsTaskId);
string_id_impls!(RemTaskId);
string_id_impls!(VaultId);
string_id_impls!(ListId);

/// The completion status of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task is not yet completed.
    Todo,
    /// Task has been completed.
    Done,
}

/// Task priority with one representation per store.
///
/// Obsidian uses the `⏫` / `🔼` / `🔽` emoji tokens; Reminders uses the
/// 1 / 5 / 9 integer convention (1 is highest).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    None,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Maps the Reminders integer convention onto [`Priority`]: exactly
    /// 1, 5, and 9 are meaningful; any other value reads as no priority.
    pub fn from_reminders_value(value: i64) -> Self {
        match value {
            1 => Self::High,
            5 => Self::Medium,
            9 => Self::Low,
            _ => Self::None,
        }
    }

    /// The canonical Reminders integer for this priority (0 for none).
    pub fn to_reminders_value(self) -> i64 {
        match self {
            Self::None => 0,
            Self::High => 1,
            Self::Medium => 5,
            Self::Low => 9,
        }
    }
}

/// A modification timestamp as delivered by a backing store.
///
/// Obsidian hands the engine ISO 8601 strings; the Reminders gateway hands
/// it native datetimes. Both shapes are normalized through [`Timestamp::resolve`]
/// so comparison is total: an unparseable value degrades to `Absent` (and is
/// logged), never to "earlier".
#[derive(Debug, Clone, PartialEq)]
pub enum Timestamp {
    Absent,
    Iso(String),
    Native(DateTime<Utc>),
}

impl Timestamp {
    /// Normalizes the timestamp to a concrete instant, if one can be read.
    pub fn resolve(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Absent => None,
            Self::Native(t) => Some(*t),
            Self::Iso(raw) => {
                let parsed = parse_iso_datetime(raw);
                if parsed.is_none() {
                    tracing::warn!(value = %raw, "unparseable timestamp treated as absent");
                }
                parsed
            }
        }
    }

    /// True when both timestamps resolve and `self` is strictly later.
    pub fn strictly_later_than(&self, other: &Timestamp) -> bool {
        match (self.resolve(), other.resolve()) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        }
    }
}

fn parse_iso_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(t.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
    }
    None
}

/// A task parsed from a Markdown vault.
#[derive(Debug, Clone, PartialEq)]
pub struct ObsidianTask {
    pub id: ObsTaskId,
    pub vault_id: VaultId,
    /// Vault-relative file path with forward slashes.
    pub file: String,
    /// Zero-based line number at snapshot time.
    pub line: usize,
    pub description: String,
    pub status: TaskStatus,
    pub due: Option<NaiveDate>,
    pub priority: Priority,
    /// Tag tokens in the order they appeared on the line.
    pub tags: Vec<String>,
    pub notes: String,
    pub created_at: Timestamp,
    pub modified_at: Timestamp,
}

/// A task fetched from the Reminders host store.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderTask {
    pub id: RemTaskId,
    pub list_id: ListId,
    pub list_name: String,
    pub title: String,
    pub status: TaskStatus,
    pub due: Option<NaiveDate>,
    pub priority: Priority,
    pub tags: Vec<String>,
    /// Free-text notes with the tag block already stripped.
    pub notes: String,
    pub created_at: Timestamp,
    pub modified_at: Timestamp,
}

/// A persisted pairing of an Obsidian task with a Reminders task.
///
/// The recovery anchors survive identifier drift on the Reminders side:
/// when `rem_id` vanishes from a snapshot, `(rem_list_id, rem_title_hash)`
/// re-identify the item before the link is retired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLink {
    pub obs_id: ObsTaskId,
    pub rem_id: RemTaskId,
    pub score: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rem_list_id: Option<ListId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rem_title_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rem_last_known_title: Option<String>,
    /// Number of consecutive runs the Reminders side has been missing.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub stale_runs: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl SyncLink {
    /// Creates a fresh link between two snapshot tasks, filling the
    /// recovery anchors from the Reminders side.
    pub fn new(obs: &ObsidianTask, rem: &ReminderTask, score: f64, now: DateTime<Utc>) -> Self {
        Self {
            obs_id: obs.id.clone(),
            rem_id: rem.id.clone(),
            score,
            created_at: now,
            last_synced: None,
            rem_list_id: Some(rem.list_id.clone()),
            rem_title_hash: Some(crate::domain::normalize::title_hash(&rem.title)),
            rem_last_known_title: Some(rem.title.clone()),
            stale_runs: 0,
        }
    }

    /// Refreshes the recovery anchors from a current snapshot of the
    /// Reminders side.
    pub fn refresh_anchors(&mut self, rem: &ReminderTask) {
        self.rem_list_id = Some(rem.list_id.clone());
        self.rem_title_hash = Some(crate::domain::normalize::title_hash(&rem.title));
        self.rem_last_known_title = Some(rem.title.clone());
        self.stale_runs = 0;
    }
}

/// A rule mapping a tag token to a destination Reminders list.
///
/// Routes live in a `Vec`, not a map: the first tag on the task that
/// matches a route wins, so iteration order is part of the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRoute {
    pub tag: String,
    pub list_id: ListId,
}

/// A rule mapping a Reminders list name to a destination vault file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRoute {
    pub list_name: String,
    pub target_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
}

/// The routing table of a single vault.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VaultRoutes {
    pub default_list_id: Option<ListId>,
    pub inbox_file: String,
    pub tag_routes: Vec<TagRoute>,
    pub list_routes: Vec<ListRoute>,
}

/// A field of a task that participates in conflict resolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SyncField {
    Description,
    Status,
    Due,
    Priority,
    Tags,
    Notes,
}

/// A concrete value for a [`SyncField`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldValue {
    Text(String),
    Status(TaskStatus),
    Due(Option<NaiveDate>),
    Priority(Priority),
    Tags(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_priority_reminders_mapping() {
        assert_eq!(Priority::from_reminders_value(1), Priority::High);
        assert_eq!(Priority::from_reminders_value(5), Priority::Medium);
        assert_eq!(Priority::from_reminders_value(9), Priority::Low);
        assert_eq!(Priority::from_reminders_value(0), Priority::None);
        // Only the canonical points carry meaning.
        assert_eq!(Priority::from_reminders_value(2), Priority::None);
        assert_eq!(Priority::from_reminders_value(4), Priority::None);
        assert_eq!(Priority::from_reminders_value(10), Priority::None);
        assert_eq!(Priority::High.to_reminders_value(), 1);
        assert_eq!(Priority::None.to_reminders_value(), 0);
    }

    #[test]
    fn test_timestamp_resolves_rfc3339() {
        let ts = Timestamp::Iso("2025-01-08T10:00:00Z".to_string());
        let expected = Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap();
        assert_eq!(ts.resolve(), Some(expected));
    }

    #[test]
    fn test_timestamp_resolves_naive_and_date_only() {
        let naive = Timestamp::Iso("2025-01-08T10:00:00".to_string());
        assert!(naive.resolve().is_some());

        let date_only = Timestamp::Iso("2025-01-08".to_string());
        let expected = Utc.with_ymd_and_hms(2025, 1, 8, 0, 0, 0).unwrap();
        assert_eq!(date_only.resolve(), Some(expected));
    }

    #[test]
    fn test_timestamp_garbage_degrades_to_absent() {
        let ts = Timestamp::Iso("not a time".to_string());
        assert_eq!(ts.resolve(), None);
        assert!(!ts.strictly_later_than(&Timestamp::Absent));
        assert!(!Timestamp::Absent.strictly_later_than(&ts));
    }

    #[test]
    fn test_native_beats_earlier_iso_string() {
        let obs = Timestamp::Iso("2025-01-08T10:00:00Z".to_string());
        let rem = Timestamp::Native(Utc.with_ymd_and_hms(2025, 1, 8, 11, 0, 0).unwrap());
        assert!(rem.strictly_later_than(&obs));
        assert!(!obs.strictly_later_than(&rem));
    }

    #[test]
    fn test_equal_timestamps_are_not_strictly_later() {
        let a = Timestamp::Iso("2025-01-08T10:00:00Z".to_string());
        let b = Timestamp::Native(Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap());
        assert!(!a.strictly_later_than(&b));
        assert!(!b.strictly_later_than(&a));
    }

    #[test]
    fn test_sync_link_serialization_is_stable() {
        let link = SyncLink {
            obs_id: ObsTaskId::from("o1"),
            rem_id: RemTaskId::from("r1"),
            score: 1.0,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            last_synced: None,
            rem_list_id: Some(ListId::from("L-default")),
            rem_title_hash: Some("abc".to_string()),
            rem_last_known_title: Some("Buy milk".to_string()),
            stale_runs: 0,
        };
        let a = serde_json::to_string(&link).unwrap();
        let b = serde_json::to_string(&link).unwrap();
        assert_eq!(a, b);
        // Absent optionals and a zero grace counter stay off disk.
        assert!(!a.contains("last_synced"));
        assert!(!a.contains("stale_runs"));
    }
}
