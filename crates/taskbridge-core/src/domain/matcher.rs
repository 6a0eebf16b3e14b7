//! Re-identification of residual tasks across stores.
//!
//! Given the Obsidian residuals A and the Reminders residuals B, the
//! matcher scores candidate pairs with a weighted similarity and selects
//! at most one partner per task via an assignment strategy. Everything is
//! keyed off id-sorted inputs so the result is deterministic.

use std::collections::HashMap;

use crate::domain::assignment::{self, Strategy};
use crate::domain::constants::{
    DEFAULT_DAYS_TOLERANCE, DEFAULT_MIN_SCORE, DESCRIPTION_WEIGHT, DUE_WEIGHT, PRIORITY_WEIGHT,
    PRUNE_TOP_K, PRUNING_THRESHOLD, TAG_WEIGHT,
};
use crate::domain::normalize::TokenBag;
use crate::types::{ObsTaskId, ObsidianTask, RemTaskId, ReminderTask};

/// Tuning knobs for the matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    /// Minimum score a returned pair must reach.
    pub min_score: f64,
    /// Due-date proximity window in days.
    pub days_tolerance: i64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            days_tolerance: DEFAULT_DAYS_TOLERANCE,
        }
    }
}

/// A pair selected by the matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    pub obs_id: ObsTaskId,
    pub rem_id: RemTaskId,
    pub score: f64,
}

/// Scores one candidate pair. Clamped to `[0, 1]`.
pub fn score_pair(
    obs: &ObsidianTask,
    rem: &ReminderTask,
    obs_bag: &TokenBag,
    rem_bag: &TokenBag,
    config: &MatcherConfig,
) -> f64 {
    let description = obs_bag.dice(rem_bag);
    let due = due_proximity(obs.due, rem.due, config.days_tolerance);
    let tags = tag_overlap(&obs.tags, &rem.tags);
    let priority = if obs.priority == rem.priority { 1.0 } else { 0.0 };

    let score = DESCRIPTION_WEIGHT * description
        + DUE_WEIGHT * due
        + TAG_WEIGHT * tags
        + PRIORITY_WEIGHT * priority;
    score.clamp(0.0, 1.0)
}

/// Due-date proximity: 1.0 when equal, linear falloff that reaches 0.0
/// at exactly `tolerance_days` apart, 0.0 beyond. A date on only one
/// side scores a neutral 0.5; two absent dates are a full match.
fn due_proximity(
    a: Option<chrono::NaiveDate>,
    b: Option<chrono::NaiveDate>,
    tolerance_days: i64,
) -> f64 {
    match (a, b) {
        (None, None) => 1.0,
        (Some(a), Some(b)) => {
            let diff = (a - b).num_days().abs();
            if diff == 0 {
                1.0
            } else if diff < tolerance_days {
                1.0 - diff as f64 / tolerance_days as f64
            } else {
                0.0
            }
        }
        _ => 0.5,
    }
}

/// Jaccard overlap of the two tag sets; both empty counts as 1.0.
fn tag_overlap(a: &[String], b: &[String]) -> f64 {
    use std::collections::HashSet;
    let a: HashSet<&str> = a.iter().map(|t| t.as_str()).collect();
    let b: HashSet<&str> = b.iter().map(|t| t.as_str()).collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    if union == 0 {
        1.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Matches two residual sets, returning pairs scoring at least
/// `config.min_score`. Each task appears in at most one pair.
pub fn match_residuals(
    obs_tasks: &[&ObsidianTask],
    rem_tasks: &[&ReminderTask],
    config: &MatcherConfig,
) -> Vec<MatchedPair> {
    if obs_tasks.is_empty() || rem_tasks.is_empty() {
        return Vec::new();
    }

    // Id-sorted views: index order below is lexicographic id order, which
    // is what makes the tie-break (and thus the whole match) stable.
    let mut obs: Vec<&ObsidianTask> = obs_tasks.to_vec();
    obs.sort_by(|a, b| a.id.cmp(&b.id));
    let mut rems: Vec<&ReminderTask> = rem_tasks.to_vec();
    rems.sort_by(|a, b| a.id.cmp(&b.id));

    let obs_bags: Vec<TokenBag> = obs.iter().map(|t| TokenBag::new(&t.description)).collect();
    let rem_bags: Vec<TokenBag> = rems.iter().map(|t| TokenBag::new(&t.title)).collect();

    let problem_size = obs.len().saturating_mul(rems.len());
    let prune = problem_size > PRUNING_THRESHOLD;

    let mut candidates: Vec<(usize, usize, f64)> = Vec::new();
    let mut scores: HashMap<(usize, usize), f64> = HashMap::new();
    for (i, obs_task) in obs.iter().enumerate() {
        let row = candidate_columns(obs_task, &obs_bags[i], &rems, &rem_bags, config, prune);
        for j in row {
            let score = score_pair(obs_task, rems[j], &obs_bags[i], &rem_bags[j], config);
            if score >= config.min_score {
                candidates.push((i, j, score));
                scores.insert((i, j), score);
            }
        }
    }

    let strategy = assignment::choose_strategy(obs.len(), rems.len());
    if strategy == Strategy::Greedy {
        tracing::debug!(
            rows = obs.len(),
            cols = rems.len(),
            "assignment degraded to greedy"
        );
    }
    let pairs = assignment::assign(obs.len(), rems.len(), &candidates, strategy);

    pairs
        .into_iter()
        .map(|(i, j)| MatchedPair {
            obs_id: obs[i].id.clone(),
            rem_id: rems[j].id.clone(),
            score: scores[&(i, j)],
        })
        .collect()
}

/// The columns considered for one row.
///
/// Without pruning this is every column. With pruning, columns are first
/// restricted to compatible due-date buckets and then cut to the top-K by
/// description similarity.
fn candidate_columns(
    obs_task: &ObsidianTask,
    obs_bag: &TokenBag,
    rems: &[&ReminderTask],
    rem_bags: &[TokenBag],
    config: &MatcherConfig,
    prune: bool,
) -> Vec<usize> {
    if !prune {
        return (0..rems.len()).collect();
    }

    let mut compatible: Vec<usize> = (0..rems.len())
        .filter(|&j| match (obs_task.due, rems[j].due) {
            (Some(a), Some(b)) => (a - b).num_days().abs() <= config.days_tolerance,
            // Undated tasks cannot be bucketed; keep them in play.
            _ => true,
        })
        .collect();

    if compatible.len() <= PRUNE_TOP_K {
        return compatible;
    }

    compatible.sort_by(|&a, &b| {
        let sim_a = obs_bag.dice(&rem_bags[a]);
        let sim_b = obs_bag.dice(&rem_bags[b]);
        sim_b
            .partial_cmp(&sim_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });
    compatible.truncate(PRUNE_TOP_K);
    compatible.sort_unstable();
    compatible
}
