//! Destination routing for cross-store creates.
//!
//! Tag routes are checked in the order the tags appear on the task; the
//! first configured match wins. The query-set expansion lives here too:
//! every list a route can send a task to must also be queried on the next
//! run, or routed tasks would look deleted.

use thiserror::Error;

use crate::types::{ListId, ObsidianTask, ReminderTask, VaultRoutes};

#[derive(Debug, Error, PartialEq)]
pub enum RouteError {
    #[error("no route for task {task_id}: no tag matches and the vault has no default list")]
    NoDestination { task_id: String },
}

/// Picks the Reminders list for an Obsidian-originated create.
pub fn route_obsidian_create(
    task: &ObsidianTask,
    routes: &VaultRoutes,
) -> Result<ListId, RouteError> {
    for tag in &task.tags {
        for route in &routes.tag_routes {
            if route.tag.eq_ignore_ascii_case(tag) {
                return Ok(route.list_id.clone());
            }
        }
    }
    routes
        .default_list_id
        .clone()
        .ok_or_else(|| RouteError::NoDestination {
            task_id: task.id.to_string(),
        })
}

/// Picks the vault file (and optional heading) for a Reminders-originated
/// create. Falls back to the vault inbox.
pub fn route_reminder_create(task: &ReminderTask, routes: &VaultRoutes) -> (String, Option<String>) {
    for route in &routes.list_routes {
        if route.list_name == task.list_name {
            return (route.target_file.clone(), route.heading.clone());
        }
    }
    (routes.inbox_file.clone(), None)
}

/// The full set of lists reachable from this vault's configuration:
/// the default list plus every routed list, sorted and deduplicated.
pub fn expand_query_lists(routes: &VaultRoutes) -> Vec<ListId> {
    let mut lists: Vec<ListId> = routes.default_list_id.iter().cloned().collect();
    lists.extend(routes.tag_routes.iter().map(|r| r.list_id.clone()));
    lists.sort();
    lists.dedup();
    lists
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::matcher::tests::{mock_obs, mock_rem};
    use crate::types::{ListRoute, TagRoute};

    fn mock_routes() -> VaultRoutes {
        VaultRoutes {
            default_list_id: Some(ListId::from("L-default")),
            inbox_file: "Inbox.md".to_string(),
            tag_routes: vec![
                TagRoute {
                    tag: "work".to_string(),
                    list_id: ListId::from("L-work"),
                },
                TagRoute {
                    tag: "home".to_string(),
                    list_id: ListId::from("L-home"),
                },
            ],
            list_routes: vec![ListRoute {
                list_name: "Groceries".to_string(),
                target_file: "Groceries.md".to_string(),
                heading: Some("## Shopping".to_string()),
            }],
        }
    }

    #[test]
    fn test_first_matching_tag_wins() {
        let mut task = mock_obs("o1", "Write report", None);
        task.tags = vec!["home".to_string(), "work".to_string()];
        // Task tag order decides, not route order.
        assert_eq!(
            route_obsidian_create(&task, &mock_routes()),
            Ok(ListId::from("L-home"))
        );
    }

    #[test]
    fn test_unrouted_task_falls_back_to_default_list() {
        let mut task = mock_obs("o1", "Write report", None);
        task.tags = vec!["misc".to_string()];
        assert_eq!(
            route_obsidian_create(&task, &mock_routes()),
            Ok(ListId::from("L-default"))
        );
    }

    #[test]
    fn test_no_default_and_no_match_is_refused() {
        let task = mock_obs("o1", "Write report", None);
        let mut routes = mock_routes();
        routes.default_list_id = None;
        assert!(matches!(
            route_obsidian_create(&task, &routes),
            Err(RouteError::NoDestination { .. })
        ));
    }

    #[test]
    fn test_reminder_routes_by_list_name() {
        let mut task = mock_rem("r1", "Buy milk", None);
        task.list_name = "Groceries".to_string();
        let (file, heading) = route_reminder_create(&task, &mock_routes());
        assert_eq!(file, "Groceries.md");
        assert_eq!(heading.as_deref(), Some("## Shopping"));
    }

    #[test]
    fn test_reminder_without_route_goes_to_inbox() {
        let task = mock_rem("r1", "Buy milk", None);
        let (file, heading) = route_reminder_create(&task, &mock_routes());
        assert_eq!(file, "Inbox.md");
        assert_eq!(heading, None);
    }

    #[test]
    fn test_query_expansion_covers_all_routed_lists() {
        let lists = expand_query_lists(&mock_routes());
        assert_eq!(
            lists,
            vec![
                ListId::from("L-default"),
                ListId::from("L-home"),
                ListId::from("L-work"),
            ]
        );
    }

    #[test]
    fn test_query_expansion_dedupes() {
        let mut routes = mock_routes();
        routes.tag_routes.push(TagRoute {
            tag: "deep-work".to_string(),
            list_id: ListId::from("L-work"),
        });
        let lists = expand_query_lists(&routes);
        assert_eq!(lists.len(), 3);
    }
}
