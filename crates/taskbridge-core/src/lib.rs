pub mod domain;
pub mod plan;
pub mod types;

pub use domain::dedup::{DuplicateCluster, find_clusters};
pub use domain::matcher::{MatchedPair, MatcherConfig, match_residuals, score_pair};
pub use domain::normalize::{TokenBag, normalize_description, title_hash};
pub use domain::resolver::{FieldResolution, Side, resolve_pair};
pub use domain::routing::{
    RouteError, expand_query_lists, route_obsidian_create, route_reminder_create,
};
pub use plan::{FieldChange, NewTask, PlanCounts, PlanError, PlanOp, SyncPlan, validate_links};
pub use types::{
    FieldValue, ListId, ListRoute, ObsTaskId, ObsidianTask, Priority, RemTaskId, ReminderTask,
    SyncField, SyncLink, TagRoute, TaskStatus, Timestamp, VaultId, VaultRoutes,
};
