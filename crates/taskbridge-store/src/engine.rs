//! The sync engine orchestrator.
//!
//! One call to [`SyncEngine::sync`] runs the whole pipeline: collect →
//! normalize links (with drift recovery) → match residuals → resolve →
//! plan creates → dedupe → apply → persist links. The plan is built as a
//! value first; apply consumes it, so dry-run and apply share every phase
//! up to that boundary.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use thiserror::Error;

use taskbridge_core::domain::constants::{LINK_GRACE_RUNS, RECOVERY_MIN_SCORE};
use taskbridge_core::{
    DuplicateCluster, FieldChange, FieldValue, ListId, MatcherConfig, NewTask, ObsTaskId,
    ObsidianTask, PlanError, PlanOp, RemTaskId, ReminderTask, Side, SyncField, SyncLink, SyncPlan,
    TaskStatus, TokenBag, VaultId, VaultRoutes, expand_query_lists, find_clusters,
    match_residuals, normalize_description, resolve_pair, route_obsidian_create,
    route_reminder_create, score_pair, title_hash, validate_links,
};

use crate::config::Settings;
use crate::links::{LinkStore, LinkStoreError};
use crate::managers::{ManagerError, ObsidianManager, RemindersGateway};
use crate::report::{ClusterMember, ClusterReport, OpFailure, SyncReport};

/// Which way changes are allowed to flow in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Both,
    ObsToRem,
    RemToObs,
}

impl Direction {
    fn allows_to_reminders(self) -> bool {
        matches!(self, Self::Both | Self::ObsToRem)
    }

    fn allows_to_obsidian(self) -> bool {
        matches!(self, Self::Both | Self::RemToObs)
    }
}

/// Per-run options.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub apply: bool,
    pub direction: Direction,
    /// Explicit list set; `None` computes the expansion from the routes.
    pub lists: Option<Vec<ListId>>,
    pub dedup: bool,
    pub dedup_auto_apply: bool,
    pub include_completed: bool,
    pub matcher: MatcherConfig,
    /// Injected clock, so runs over identical inputs are byte-identical.
    pub now: DateTime<Utc>,
    /// Cooperative cancellation: checked between phases. The running
    /// phase completes, the plan is discarded, links stay unwritten.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl SyncOptions {
    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

impl SyncOptions {
    pub fn from_settings(settings: &Settings, now: DateTime<Utc>) -> Self {
        Self {
            apply: false,
            direction: Direction::Both,
            lists: None,
            dedup: settings.enable_deduplication,
            dedup_auto_apply: settings.dedup_auto_apply,
            include_completed: settings.include_completed,
            matcher: MatcherConfig {
                min_score: settings.min_score,
                days_tolerance: settings.days_tolerance,
            },
            now,
            cancel: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("reminders authorization denied; no mutation attempted")]
    Authorization,

    #[error("run cancelled; plan discarded, links unchanged")]
    Cancelled,

    #[error("failed to collect tasks: {0}")]
    Collect(#[source] ManagerError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    LinkStore(#[from] LinkStoreError),
}

pub struct SyncEngine<'a> {
    obsidian: &'a mut dyn ObsidianManager,
    reminders: &'a mut dyn RemindersGateway,
    links: &'a mut LinkStore,
    vault_id: VaultId,
    routes: VaultRoutes,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        obsidian: &'a mut dyn ObsidianManager,
        reminders: &'a mut dyn RemindersGateway,
        links: &'a mut LinkStore,
        vault_id: VaultId,
        routes: VaultRoutes,
    ) -> Self {
        Self {
            obsidian,
            reminders,
            links,
            vault_id,
            routes,
        }
    }

    /// Runs the full pipeline and returns the report.
    pub fn sync(&mut self, options: &SyncOptions) -> Result<SyncReport, EngineError> {
        let mut diagnostics = Vec::new();

        // Collect. The query set must cover every routed list or tasks
        // created into one on the previous run would look deleted.
        let query = options
            .lists
            .clone()
            .unwrap_or_else(|| expand_query_lists(&self.routes));
        tracing::debug!(vault = %self.vault_id, lists = query.len(), "collecting snapshots");

        let mut obs_tasks = self.obsidian.list_tasks(&self.vault_id).map_err(collect_error)?;
        obs_tasks.sort_by(|a, b| a.id.cmp(&b.id));
        let mut rem_tasks = self.reminders.list_reminders(&query).map_err(collect_error)?;
        rem_tasks.sort_by(|a, b| a.id.cmp(&b.id));

        if options.cancelled() {
            return Err(EngineError::Cancelled);
        }

        let obs_by_id: BTreeMap<&ObsTaskId, &ObsidianTask> =
            obs_tasks.iter().map(|t| (&t.id, t)).collect();
        let rem_by_id: BTreeMap<&RemTaskId, &ReminderTask> =
            rem_tasks.iter().map(|t| (&t.id, t)).collect();

        // Normalize links: keep, recover, or retire with tombstones.
        let stored_links = self.links.links().to_vec();
        let normalized = normalize_links(
            &stored_links,
            &obs_by_id,
            &rem_by_id,
            &options.matcher,
            &mut diagnostics,
        );
        let NormalizedLinks {
            mut live_links,
            tombstone_obs,
            tombstone_rem,
        } = normalized;

        // Partition into linked and residual tasks.
        let linked_obs: HashSet<&ObsTaskId> = live_links.iter().map(|l| &l.obs_id).collect();
        let linked_rem: HashSet<&RemTaskId> = live_links.iter().map(|l| &l.rem_id).collect();
        let tombstoned_obs: HashSet<&ObsTaskId> = tombstone_obs.iter().collect();
        let tombstoned_rem: HashSet<&RemTaskId> = tombstone_rem.iter().collect();

        let keep_residual = |status: TaskStatus| options.include_completed || status == TaskStatus::Todo;
        let residual_obs: Vec<&ObsidianTask> = obs_tasks
            .iter()
            .filter(|t| {
                !linked_obs.contains(&t.id)
                    && !tombstoned_obs.contains(&t.id)
                    && keep_residual(t.status)
            })
            .collect();
        let residual_rem: Vec<&ReminderTask> = rem_tasks
            .iter()
            .filter(|t| {
                !linked_rem.contains(&t.id)
                    && !tombstoned_rem.contains(&t.id)
                    && keep_residual(t.status)
            })
            .collect();

        // Match residuals into proposed links.
        let proposed = match_residuals(&residual_obs, &residual_rem, &options.matcher);
        let mut new_links: Vec<SyncLink> = proposed
            .iter()
            .map(|pair| {
                let obs = obs_by_id[&pair.obs_id];
                let rem = rem_by_id[&pair.rem_id];
                SyncLink::new(obs, rem, pair.score, options.now)
            })
            .collect();
        if !new_links.is_empty() {
            tracing::debug!(count = new_links.len(), "proposed new links");
        }

        // Resolve every pair that has both sides in the snapshot.
        let mut plan = SyncPlan::default();
        let mut dirty_obs: HashMap<ObsTaskId, RemTaskId> = HashMap::new();
        for link in live_links.iter().chain(new_links.iter()) {
            let (Some(obs), Some(rem)) = (
                obs_by_id.get(&link.obs_id).copied(),
                rem_by_id.get(&link.rem_id).copied(),
            ) else {
                // A grace-period link with a stale Reminders id.
                continue;
            };
            let resolutions = resolve_pair(obs, rem);
            if resolutions.is_empty() {
                continue;
            }

            let mut obs_changes = Vec::new();
            let mut rem_changes = Vec::new();
            for resolution in resolutions {
                let change = FieldChange {
                    field: resolution.field,
                    value: resolution.value,
                };
                if options.direction.allows_to_obsidian()
                    && field_differs(&obs_field(obs, resolution.field), &change.value)
                {
                    obs_changes.push(change.clone());
                }
                if options.direction.allows_to_reminders()
                    && field_differs(&rem_field(rem, resolution.field), &change.value)
                {
                    rem_changes.push(change);
                }
            }

            if !obs_changes.is_empty() {
                plan.push(PlanOp::UpdateObsidian {
                    id: obs.id.clone(),
                    changes: obs_changes,
                });
                dirty_obs.insert(obs.id.clone(), rem.id.clone());
            }
            if !rem_changes.is_empty() {
                plan.push(PlanOp::UpdateReminder {
                    id: rem.id.clone(),
                    changes: rem_changes,
                });
                dirty_obs.insert(obs.id.clone(), rem.id.clone());
            }
        }

        // Plan creates for the unmatched residuals.
        let matched_obs: HashSet<&ObsTaskId> = proposed.iter().map(|p| &p.obs_id).collect();
        let matched_rem: HashSet<&RemTaskId> = proposed.iter().map(|p| &p.rem_id).collect();
        let mut failures: Vec<OpFailure> = Vec::new();

        let linked_obs_descriptions: HashSet<String> = live_links
            .iter()
            .chain(new_links.iter())
            .filter_map(|l| obs_by_id.get(&l.obs_id))
            .map(|t| normalize_description(&t.description))
            .collect();
        let linked_rem_descriptions: HashSet<String> = live_links
            .iter()
            .chain(new_links.iter())
            .filter_map(|l| rem_by_id.get(&l.rem_id))
            .map(|t| normalize_description(&t.title))
            .collect();

        if options.direction.allows_to_reminders() {
            for obs in residual_obs.iter().filter(|t| !matched_obs.contains(&t.id)) {
                if linked_obs_descriptions.contains(&normalize_description(&obs.description)) {
                    diagnostics.push(format!(
                        "create suppressed for {}: description collides with a linked task",
                        obs.id
                    ));
                    continue;
                }
                match route_obsidian_create(obs, &self.routes) {
                    Ok(list_id) => plan.push(PlanOp::CreateReminder {
                        source_obs_id: obs.id.clone(),
                        list_id,
                        fields: new_task_from_obs(obs),
                    }),
                    Err(err) => failures.push(OpFailure {
                        op: format!("create reminder (from {})", obs.id),
                        kind: crate::report::FailureKind::Configuration,
                        error: err.to_string(),
                    }),
                }
            }
        }

        if options.direction.allows_to_obsidian() {
            for rem in residual_rem.iter().filter(|t| !matched_rem.contains(&t.id)) {
                if linked_rem_descriptions.contains(&normalize_description(&rem.title)) {
                    diagnostics.push(format!(
                        "create suppressed for {}: description collides with a linked task",
                        rem.id
                    ));
                    continue;
                }
                let (file, heading) = route_reminder_create(rem, &self.routes);
                plan.push(PlanOp::CreateObsidian {
                    source_rem_id: rem.id.clone(),
                    file,
                    heading,
                    fields: new_task_from_rem(rem),
                });
            }
        }

        // Tombstones: propagate the deletion instead of re-creating.
        if options.direction.allows_to_reminders() {
            for id in &tombstone_rem {
                plan.push(PlanOp::DeleteReminder { id: id.clone() });
            }
        } else if !tombstone_rem.is_empty() {
            diagnostics.push(format!(
                "{} reminder tombstone(s) suppressed by direction filter",
                tombstone_rem.len()
            ));
        }
        if options.direction.allows_to_obsidian() {
            for id in &tombstone_obs {
                plan.push(PlanOp::DeleteObsidian { id: id.clone() });
            }
        } else if !tombstone_obs.is_empty() {
            diagnostics.push(format!(
                "{} obsidian tombstone(s) suppressed by direction filter",
                tombstone_obs.len()
            ));
        }

        // Dedupe both stores, excluding anything linked.
        let mut dedup_clusters = Vec::new();
        if options.dedup {
            let excluded_obs: HashSet<ObsTaskId> = linked_obs
                .iter()
                .map(|id| (*id).clone())
                .chain(matched_obs.iter().map(|id| (*id).clone()))
                .chain(tombstone_obs.iter().cloned())
                .collect();
            let obs_items: Vec<(ObsTaskId, &str)> = obs_tasks
                .iter()
                .filter(|t| keep_residual(t.status))
                .map(|t| (t.id.clone(), t.description.as_str()))
                .collect();
            let obs_clusters = find_clusters(&obs_items, &excluded_obs);

            let excluded_rem: HashSet<RemTaskId> = linked_rem
                .iter()
                .map(|id| (*id).clone())
                .chain(matched_rem.iter().map(|id| (*id).clone()))
                .chain(tombstone_rem.iter().cloned())
                .collect();
            let rem_items: Vec<(RemTaskId, &str)> = rem_tasks
                .iter()
                .filter(|t| keep_residual(t.status))
                .map(|t| (t.id.clone(), t.title.as_str()))
                .collect();
            let rem_clusters = find_clusters(&rem_items, &excluded_rem);

            if options.dedup_auto_apply {
                for op in auto_dedup_ops(&obs_clusters, &rem_clusters) {
                    plan.push(op);
                }
            }

            dedup_clusters.extend(obs_clusters.iter().map(|c| ClusterReport {
                store: Side::Obsidian,
                normalized: c.normalized.clone(),
                members: c
                    .member_ids
                    .iter()
                    .filter_map(|id| obs_by_id.get(id))
                    .map(|t| ClusterMember {
                        id: t.id.to_string(),
                        location: format!("{}:{}", t.file, t.line + 1),
                        due: t.due,
                        status: t.status,
                    })
                    .collect(),
            }));
            dedup_clusters.extend(rem_clusters.iter().map(|c| ClusterReport {
                store: Side::Reminders,
                normalized: c.normalized.clone(),
                members: c
                    .member_ids
                    .iter()
                    .filter_map(|id| rem_by_id.get(id))
                    .map(|t| ClusterMember {
                        id: t.id.to_string(),
                        location: t.list_name.clone(),
                        due: t.due,
                        status: t.status,
                    })
                    .collect(),
            }));
        }

        plan.sort();

        // A link set violating 1:1 is fatal: no apply, no persist.
        let mut prospective: Vec<SyncLink> = live_links.clone();
        prospective.extend(new_links.iter().cloned());
        validate_links(&prospective)?;

        if options.cancelled() {
            return Err(EngineError::Cancelled);
        }

        // Apply (or not), then persist links.
        let mut applied = 0usize;
        let mut created_links: Vec<SyncLink> = Vec::new();
        let mut missing_created_id = false;
        let mut applied_dirty: HashSet<ObsTaskId> = HashSet::new();

        if options.apply {
            for op in plan.ops.clone() {
                match self.apply_op(&op, &obs_by_id, options.now) {
                    Ok(outcome) => {
                        applied += 1;
                        match outcome {
                            ApplyOutcome::Done => {}
                            ApplyOutcome::Linked(link) => created_links.push(link),
                            ApplyOutcome::MissingId(source) => {
                                missing_created_id = true;
                                diagnostics.push(format!(
                                    "create for {source} returned no id; links left unchanged"
                                ));
                            }
                        }
                        if let PlanOp::UpdateObsidian { id, .. } = &op {
                            applied_dirty.insert(id.clone());
                        }
                        if let PlanOp::UpdateReminder { id, .. } = &op {
                            if let Some((obs_id, _)) = dirty_obs.iter().find(|(_, r)| *r == id) {
                                applied_dirty.insert(obs_id.clone());
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!(op = %op.describe(), error = %err, "operation failed");
                        failures.push(OpFailure {
                            op: op.describe(),
                            kind: (&err).into(),
                            error: err.to_string(),
                        });
                    }
                }
            }
        }

        // Bump last_synced on pairs whose updates actually landed.
        if options.apply {
            for link in live_links.iter_mut().chain(new_links.iter_mut()) {
                if applied_dirty.contains(&link.obs_id) {
                    link.last_synced = Some(options.now);
                }
            }
        }

        let links_persisted = if missing_created_id {
            // A create succeeded but its id is unknown: persisting would
            // desynchronize the map, so the previous set stays on disk.
            tracing::warn!("link persistence skipped: a create returned no id");
            false
        } else {
            let mut final_links = live_links;
            final_links.extend(new_links);
            final_links.extend(created_links);
            self.links.save(final_links)?;
            true
        };

        let counts = plan.counts();
        Ok(SyncReport {
            vault_id: self.vault_id.to_string(),
            dry_run: !options.apply,
            plan,
            counts,
            applied,
            failures,
            dedup_clusters,
            diagnostics,
            links_persisted,
        })
    }

    fn apply_op(
        &mut self,
        op: &PlanOp,
        obs_by_id: &BTreeMap<&ObsTaskId, &ObsidianTask>,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome, ManagerError> {
        match op {
            PlanOp::UpdateObsidian { id, changes } => {
                let task = obs_by_id
                    .get(id)
                    .ok_or_else(|| ManagerError::NotFound(id.to_string()))?;
                self.obsidian.update_task(task, changes)?;
                Ok(ApplyOutcome::Done)
            }
            PlanOp::UpdateReminder { id, changes } => {
                self.reminders.update_reminder(id, changes)?;
                Ok(ApplyOutcome::Done)
            }
            PlanOp::CreateReminder {
                source_obs_id,
                list_id,
                fields,
            } => match self.reminders.create_reminder(list_id, fields)? {
                Some(new_id) => Ok(ApplyOutcome::Linked(SyncLink {
                    obs_id: source_obs_id.clone(),
                    rem_id: new_id,
                    score: 1.0,
                    created_at: now,
                    last_synced: Some(now),
                    rem_list_id: Some(list_id.clone()),
                    rem_title_hash: Some(title_hash(&fields.description)),
                    rem_last_known_title: Some(fields.description.clone()),
                    stale_runs: 0,
                })),
                None => Ok(ApplyOutcome::MissingId(source_obs_id.to_string())),
            },
            PlanOp::CreateObsidian {
                source_rem_id,
                file,
                heading,
                fields,
            } => {
                let vault_id = self.vault_id.clone();
                let created =
                    self.obsidian
                        .create_task(&vault_id, file, heading.as_deref(), fields)?;
                Ok(ApplyOutcome::Linked(SyncLink {
                    obs_id: created.id,
                    rem_id: source_rem_id.clone(),
                    score: 1.0,
                    created_at: now,
                    last_synced: Some(now),
                    rem_list_id: None,
                    rem_title_hash: Some(title_hash(&fields.description)),
                    rem_last_known_title: Some(fields.description.clone()),
                    stale_runs: 0,
                }))
            }
            PlanOp::DeleteObsidian { id } => {
                let task = obs_by_id
                    .get(id)
                    .ok_or_else(|| ManagerError::NotFound(id.to_string()))?;
                self.obsidian.delete_task(task)?;
                Ok(ApplyOutcome::Done)
            }
            PlanOp::DeleteReminder { id } => {
                self.reminders.delete_reminder(id)?;
                Ok(ApplyOutcome::Done)
            }
        }
    }
}

enum ApplyOutcome {
    Done,
    /// A create that produced a fresh link.
    Linked(SyncLink),
    /// A create that succeeded without reporting an id.
    MissingId(String),
}

fn collect_error(err: ManagerError) -> EngineError {
    match err {
        ManagerError::Authorization => EngineError::Authorization,
        other => EngineError::Collect(other),
    }
}

struct NormalizedLinks {
    live_links: Vec<SyncLink>,
    tombstone_obs: Vec<ObsTaskId>,
    tombstone_rem: Vec<RemTaskId>,
}

/// Walks the stored links against the current snapshots: refresh anchors
/// for intact pairs, recover drifted Reminders ids, grant one grace run
/// to unrecovered links, and retire the rest with tombstones.
fn normalize_links(
    stored: &[SyncLink],
    obs_by_id: &BTreeMap<&ObsTaskId, &ObsidianTask>,
    rem_by_id: &BTreeMap<&RemTaskId, &ReminderTask>,
    matcher: &MatcherConfig,
    diagnostics: &mut Vec<String>,
) -> NormalizedLinks {
    let mut live_links = Vec::new();
    let mut tombstone_obs = Vec::new();
    let mut tombstone_rem = Vec::new();

    // Reminders ids already spoken for; recovery may only claim residuals.
    let mut claimed_rem: HashSet<&RemTaskId> = stored
        .iter()
        .filter(|l| rem_by_id.contains_key(&l.rem_id))
        .map(|l| &l.rem_id)
        .collect();

    for link in stored {
        let obs_present = obs_by_id.contains_key(&link.obs_id);
        let rem_task = rem_by_id.get(&link.rem_id).copied();

        match (obs_present, rem_task) {
            (true, Some(rem)) => {
                let mut link = link.clone();
                link.refresh_anchors(rem);
                live_links.push(link);
            }
            (false, Some(_)) => {
                diagnostics.push(format!(
                    "link {} / {} retired: obsidian task is gone",
                    link.obs_id, link.rem_id
                ));
                tombstone_rem.push(link.rem_id.clone());
            }
            (false, None) => {
                diagnostics.push(format!(
                    "link {} / {} dropped: both sides gone",
                    link.obs_id, link.rem_id
                ));
            }
            (true, None) => {
                if let Some(recovered) =
                    recover_link(link, obs_by_id, rem_by_id, &claimed_rem, matcher)
                {
                    diagnostics.push(format!(
                        "link {} recovered: {} -> {}",
                        link.obs_id, link.rem_id, recovered.rem_id
                    ));
                    live_links.push(recovered);
                    // Claim the rewritten id so no later link can take it.
                    let claimed = live_links.last().expect("just pushed");
                    if let Some((id, _)) = rem_by_id.get_key_value(&claimed.rem_id) {
                        claimed_rem.insert(*id);
                    }
                } else if link.stale_runs < LINK_GRACE_RUNS {
                    let mut link = link.clone();
                    link.stale_runs += 1;
                    diagnostics.push(format!(
                        "link {} has a stale reminder id {} (grace run {}/{})",
                        link.obs_id, link.rem_id, link.stale_runs, LINK_GRACE_RUNS
                    ));
                    tracing::warn!(obs = %link.obs_id, rem = %link.rem_id, "identifier drift: recovery pending");
                    live_links.push(link);
                } else {
                    diagnostics.push(format!(
                        "link {} / {} retired: reminder gone past grace",
                        link.obs_id, link.rem_id
                    ));
                    tombstone_obs.push(link.obs_id.clone());
                }
            }
        }
    }

    NormalizedLinks {
        live_links,
        tombstone_obs,
        tombstone_rem,
    }
}

/// Attempts anchor-based recovery of a link whose `rem_id` vanished.
///
/// Exactly one unclaimed Reminders task must match the stored
/// `(rem_list_id, rem_title_hash)` anchors and score at least the
/// recovery threshold against the Obsidian side.
fn recover_link(
    link: &SyncLink,
    obs_by_id: &BTreeMap<&ObsTaskId, &ObsidianTask>,
    rem_by_id: &BTreeMap<&RemTaskId, &ReminderTask>,
    claimed_rem: &HashSet<&RemTaskId>,
    matcher: &MatcherConfig,
) -> Option<SyncLink> {
    let obs = obs_by_id.get(&link.obs_id).copied()?;
    let (list_id, hash) = (link.rem_list_id.as_ref()?, link.rem_title_hash.as_ref()?);

    let candidates: Vec<&ReminderTask> = rem_by_id
        .values()
        .filter(|rem| !claimed_rem.contains(&rem.id))
        .filter(|rem| &rem.list_id == list_id && &title_hash(&rem.title) == hash)
        .copied()
        .collect();

    let [candidate] = candidates.as_slice() else {
        return None;
    };

    let score = score_pair(
        obs,
        candidate,
        &TokenBag::new(&obs.description),
        &TokenBag::new(&candidate.title),
        matcher,
    );
    if score < RECOVERY_MIN_SCORE {
        return None;
    }

    let mut recovered = link.clone();
    recovered.rem_id = candidate.id.clone();
    recovered.refresh_anchors(candidate);
    Some(recovered)
}

/// Auto-disposition: keep the first member of each cluster, delete the
/// rest.
fn auto_dedup_ops(
    obs_clusters: &[DuplicateCluster<ObsTaskId>],
    rem_clusters: &[DuplicateCluster<RemTaskId>],
) -> Vec<PlanOp> {
    let mut ops = Vec::new();
    for cluster in obs_clusters {
        for id in cluster.member_ids.iter().skip(1) {
            ops.push(PlanOp::DeleteObsidian { id: id.clone() });
        }
    }
    for cluster in rem_clusters {
        for id in cluster.member_ids.iter().skip(1) {
            ops.push(PlanOp::DeleteReminder { id: id.clone() });
        }
    }
    ops
}

/// Turns an external dedup disposition into delete operations: members
/// of each cluster not named in the decision are deleted.
pub fn dedup_disposition_ops(
    obs_clusters: &[DuplicateCluster<ObsTaskId>],
    rem_clusters: &[DuplicateCluster<RemTaskId>],
    keep: &HashMap<String, HashSet<String>>,
) -> Vec<PlanOp> {
    let mut ops = Vec::new();
    for cluster in obs_clusters {
        let Some(kept) = keep.get(&cluster.normalized) else {
            continue;
        };
        for id in &cluster.member_ids {
            if !kept.contains(id.as_str()) {
                ops.push(PlanOp::DeleteObsidian { id: id.clone() });
            }
        }
    }
    for cluster in rem_clusters {
        let Some(kept) = keep.get(&cluster.normalized) else {
            continue;
        };
        for id in &cluster.member_ids {
            if !kept.contains(id.as_str()) {
                ops.push(PlanOp::DeleteReminder { id: id.clone() });
            }
        }
    }
    ops
}

fn obs_field(task: &ObsidianTask, field: SyncField) -> FieldValue {
    match field {
        SyncField::Description => FieldValue::Text(task.description.clone()),
        SyncField::Status => FieldValue::Status(task.status),
        SyncField::Due => FieldValue::Due(task.due),
        SyncField::Priority => FieldValue::Priority(task.priority),
        SyncField::Tags => FieldValue::Tags(task.tags.clone()),
        SyncField::Notes => FieldValue::Text(task.notes.clone()),
    }
}

fn rem_field(task: &ReminderTask, field: SyncField) -> FieldValue {
    match field {
        SyncField::Description => FieldValue::Text(task.title.clone()),
        SyncField::Status => FieldValue::Status(task.status),
        SyncField::Due => FieldValue::Due(task.due),
        SyncField::Priority => FieldValue::Priority(task.priority),
        SyncField::Tags => FieldValue::Tags(task.tags.clone()),
        SyncField::Notes => FieldValue::Text(task.notes.clone()),
    }
}

/// Value inequality with set semantics for tags (order is display-only).
fn field_differs(current: &FieldValue, target: &FieldValue) -> bool {
    match (current, target) {
        (FieldValue::Tags(a), FieldValue::Tags(b)) => {
            let a: HashSet<&str> = a.iter().map(|t| t.as_str()).collect();
            let b: HashSet<&str> = b.iter().map(|t| t.as_str()).collect();
            a != b
        }
        (a, b) => a != b,
    }
}

fn new_task_from_obs(task: &ObsidianTask) -> NewTask {
    NewTask {
        description: task.description.clone(),
        status: task.status,
        due: task.due,
        priority: task.priority,
        tags: task.tags.clone(),
        notes: task.notes.clone(),
    }
}

fn new_task_from_rem(task: &ReminderTask) -> NewTask {
    NewTask {
        description: task.title.clone(),
        status: task.status,
        due: task.due,
        priority: task.priority,
        tags: task.tags.clone(),
        notes: task.notes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_gates() {
        assert!(Direction::Both.allows_to_reminders());
        assert!(Direction::Both.allows_to_obsidian());
        assert!(Direction::ObsToRem.allows_to_reminders());
        assert!(!Direction::ObsToRem.allows_to_obsidian());
        assert!(!Direction::RemToObs.allows_to_reminders());
        assert!(Direction::RemToObs.allows_to_obsidian());
    }

    #[test]
    fn test_field_differs_uses_set_semantics_for_tags() {
        let a = FieldValue::Tags(vec!["a".to_string(), "b".to_string()]);
        let b = FieldValue::Tags(vec!["b".to_string(), "a".to_string()]);
        let c = FieldValue::Tags(vec!["c".to_string()]);
        assert!(!field_differs(&a, &b));
        assert!(field_differs(&a, &c));
        assert!(field_differs(
            &FieldValue::Text("x".to_string()),
            &FieldValue::Text("y".to_string())
        ));
    }

    #[test]
    fn test_dedup_disposition_deletes_non_kept_members() {
        let obs_clusters = vec![DuplicateCluster {
            normalized: "call alice".to_string(),
            member_ids: vec![ObsTaskId::from("o1"), ObsTaskId::from("o2")],
        }];
        let rem_clusters: Vec<DuplicateCluster<RemTaskId>> = Vec::new();

        let mut keep = HashMap::new();
        keep.insert(
            "call alice".to_string(),
            ["o1".to_string()].into_iter().collect::<HashSet<_>>(),
        );

        let ops = dedup_disposition_ops(&obs_clusters, &rem_clusters, &keep);
        assert_eq!(
            ops,
            vec![PlanOp::DeleteObsidian {
                id: ObsTaskId::from("o2")
            }]
        );

        // Clusters without a decision are left alone.
        let ops = dedup_disposition_ops(&obs_clusters, &rem_clusters, &HashMap::new());
        assert!(ops.is_empty());
    }
}
