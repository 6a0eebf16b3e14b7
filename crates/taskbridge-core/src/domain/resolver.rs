//! Per-field conflict resolution for a linked pair.
//!
//! The side whose `modified_at` is strictly later wins a contested field;
//! Obsidian wins ties and absent timestamps. Tags are special-cased: when
//! both sides carry tags and the sets differ, the resolution is the union
//! rather than a winner-takes-all overwrite.

use serde::{Deserialize, Serialize};

use crate::types::{FieldValue, ObsidianTask, ReminderTask, SyncField};

/// Which store a resolved value originates from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Obsidian,
    Reminders,
}

/// One resolved field of a dirty pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldResolution {
    pub field: SyncField,
    pub winner: Side,
    pub value: FieldValue,
}

/// Resolves a linked pair field by field.
///
/// An empty result means the pair is already in sync.
pub fn resolve_pair(obs: &ObsidianTask, rem: &ReminderTask) -> Vec<FieldResolution> {
    let winner = if rem.modified_at.strictly_later_than(&obs.modified_at) {
        Side::Reminders
    } else {
        Side::Obsidian
    };

    let mut resolutions = Vec::new();

    if obs.description != rem.title {
        resolutions.push(FieldResolution {
            field: SyncField::Description,
            winner,
            value: FieldValue::Text(pick(winner, &obs.description, &rem.title).clone()),
        });
    }

    if obs.status != rem.status {
        resolutions.push(FieldResolution {
            field: SyncField::Status,
            winner,
            value: FieldValue::Status(*pick(winner, &obs.status, &rem.status)),
        });
    }

    if obs.due != rem.due {
        resolutions.push(FieldResolution {
            field: SyncField::Due,
            winner,
            value: FieldValue::Due(*pick(winner, &obs.due, &rem.due)),
        });
    }

    if obs.priority != rem.priority {
        resolutions.push(FieldResolution {
            field: SyncField::Priority,
            winner,
            value: FieldValue::Priority(*pick(winner, &obs.priority, &rem.priority)),
        });
    }

    if let Some(resolution) = resolve_tags(obs, rem, winner) {
        resolutions.push(resolution);
    }

    if obs.notes != rem.notes {
        resolutions.push(FieldResolution {
            field: SyncField::Notes,
            winner,
            value: FieldValue::Text(pick(winner, &obs.notes, &rem.notes).clone()),
        });
    }

    resolutions
}

fn pick<'a, T>(winner: Side, obs: &'a T, rem: &'a T) -> &'a T {
    match winner {
        Side::Obsidian => obs,
        Side::Reminders => rem,
    }
}

fn resolve_tags(obs: &ObsidianTask, rem: &ReminderTask, winner: Side) -> Option<FieldResolution> {
    if same_tag_set(&obs.tags, &rem.tags) {
        return None;
    }

    let value = if !obs.tags.is_empty() && !rem.tags.is_empty() {
        // Both sides changed: merge, keeping the winner's order first.
        let (first, second) = match winner {
            Side::Obsidian => (&obs.tags, &rem.tags),
            Side::Reminders => (&rem.tags, &obs.tags),
        };
        let mut union = first.clone();
        for tag in second {
            if !union.contains(tag) {
                union.push(tag.clone());
            }
        }
        union
    } else {
        pick(winner, &obs.tags, &rem.tags).clone()
    };

    Some(FieldResolution {
        field: SyncField::Tags,
        winner,
        value: FieldValue::Tags(value),
    })
}

/// Tag equality is set equality; order is display-only.
fn same_tag_set(a: &[String], b: &[String]) -> bool {
    use std::collections::HashSet;
    let a: HashSet<&str> = a.iter().map(|t| t.as_str()).collect();
    let b: HashSet<&str> = b.iter().map(|t| t.as_str()).collect();
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::matcher::tests::{mock_obs, mock_rem};
    use crate::types::{TaskStatus, Timestamp};
    use chrono::TimeZone;
    use chrono::Utc;

    #[test]
    fn test_clean_pair_resolves_empty() {
        let obs = mock_obs("o1", "Buy milk", Some("2025-01-15"));
        let rem = mock_rem("r1", "Buy milk", Some("2025-01-15"));
        assert!(resolve_pair(&obs, &rem).is_empty());
    }

    #[test]
    fn test_reminders_completion_wins_with_native_later_timestamp() {
        // Obsidian carries an ISO string, Reminders a native datetime one
        // hour later. The status winner must be Reminders.
        let mut obs = mock_obs("o3", "Ship release", None);
        obs.status = TaskStatus::Todo;
        obs.modified_at = Timestamp::Iso("2025-01-08T10:00:00Z".to_string());

        let mut rem = mock_rem("r3", "Ship release", None);
        rem.status = TaskStatus::Done;
        rem.modified_at = Timestamp::Native(Utc.with_ymd_and_hms(2025, 1, 8, 11, 0, 0).unwrap());

        let resolutions = resolve_pair(&obs, &rem);
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].field, SyncField::Status);
        assert_eq!(resolutions[0].winner, Side::Reminders);
        assert_eq!(resolutions[0].value, FieldValue::Status(TaskStatus::Done));
    }

    #[test]
    fn test_obsidian_wins_on_equal_timestamps() {
        let mut obs = mock_obs("o1", "Original wording", None);
        obs.modified_at = Timestamp::Iso("2025-01-08T10:00:00Z".to_string());
        let mut rem = mock_rem("r1", "Edited wording", None);
        rem.modified_at = Timestamp::Native(Utc.with_ymd_and_hms(2025, 1, 8, 10, 0, 0).unwrap());

        let resolutions = resolve_pair(&obs, &rem);
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].winner, Side::Obsidian);
        assert_eq!(
            resolutions[0].value,
            FieldValue::Text("Original wording".to_string())
        );
    }

    #[test]
    fn test_obsidian_wins_when_both_timestamps_absent() {
        let mut obs = mock_obs("o1", "Task", None);
        obs.priority = crate::types::Priority::High;
        let rem = mock_rem("r1", "Task", None);

        let resolutions = resolve_pair(&obs, &rem);
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].winner, Side::Obsidian);
        assert_eq!(
            resolutions[0].value,
            FieldValue::Priority(crate::types::Priority::High)
        );
    }

    #[test]
    fn test_unparseable_reminders_timestamp_never_wins() {
        let mut obs = mock_obs("o1", "Task", None);
        obs.status = TaskStatus::Todo;
        obs.modified_at = Timestamp::Iso("2025-01-08T10:00:00Z".to_string());
        let mut rem = mock_rem("r1", "Task", None);
        rem.status = TaskStatus::Done;
        rem.modified_at = Timestamp::Iso("garbage".to_string());

        let resolutions = resolve_pair(&obs, &rem);
        assert_eq!(resolutions[0].winner, Side::Obsidian);
        assert_eq!(resolutions[0].value, FieldValue::Status(TaskStatus::Todo));
    }

    #[test]
    fn test_tags_union_when_both_sides_tagged() {
        let mut obs = mock_obs("o1", "Task", None);
        obs.tags = vec!["work".to_string(), "urgent".to_string()];
        obs.modified_at = Timestamp::Iso("2025-01-08T10:00:00Z".to_string());
        let mut rem = mock_rem("r1", "Task", None);
        rem.tags = vec!["home".to_string()];
        rem.modified_at = Timestamp::Native(Utc.with_ymd_and_hms(2025, 1, 8, 12, 0, 0).unwrap());

        let resolutions = resolve_pair(&obs, &rem);
        assert_eq!(resolutions.len(), 1);
        // Winner (Reminders) order first, then the Obsidian leftovers.
        assert_eq!(
            resolutions[0].value,
            FieldValue::Tags(vec![
                "home".to_string(),
                "work".to_string(),
                "urgent".to_string()
            ])
        );
    }

    #[test]
    fn test_tags_timestamp_rule_when_one_side_empty() {
        let mut obs = mock_obs("o1", "Task", None);
        obs.tags = vec!["work".to_string()];
        let rem = mock_rem("r1", "Task", None);

        // Equal (absent) timestamps: Obsidian wins, tags flow to Reminders.
        let resolutions = resolve_pair(&obs, &rem);
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].winner, Side::Obsidian);
        assert_eq!(
            resolutions[0].value,
            FieldValue::Tags(vec!["work".to_string()])
        );
    }

    #[test]
    fn test_tag_order_differences_are_not_conflicts() {
        let mut obs = mock_obs("o1", "Task", None);
        obs.tags = vec!["a".to_string(), "b".to_string()];
        let mut rem = mock_rem("r1", "Task", None);
        rem.tags = vec!["b".to_string(), "a".to_string()];
        assert!(resolve_pair(&obs, &rem).is_empty());
    }

    #[test]
    fn test_notes_follow_the_timestamp_rule() {
        let mut obs = mock_obs("o1", "Task", None);
        obs.notes = "old notes".to_string();
        obs.modified_at = Timestamp::Iso("2025-01-08T10:00:00Z".to_string());
        let mut rem = mock_rem("r1", "Task", None);
        rem.notes = "new notes".to_string();
        rem.modified_at = Timestamp::Native(Utc.with_ymd_and_hms(2025, 1, 9, 0, 0, 0).unwrap());

        let resolutions = resolve_pair(&obs, &rem);
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].field, SyncField::Notes);
        assert_eq!(
            resolutions[0].value,
            FieldValue::Text("new notes".to_string())
        );
    }
}
