//! Property tests for the matcher's structural invariants: the returned
//! pairing is 1:1, respects the score threshold, and does not depend on
//! input order.

use proptest::prelude::*;
use std::collections::HashSet;

use taskbridge_core::{
    ListId, MatcherConfig, ObsTaskId, ObsidianTask, Priority, RemTaskId, ReminderTask, TaskStatus,
    Timestamp, VaultId, match_residuals,
};

fn make_obs(index: usize, description: String, due_day: Option<u32>) -> ObsidianTask {
    ObsidianTask {
        id: ObsTaskId::from(format!("o{index:03}")),
        vault_id: VaultId::from("vault"),
        file: "Tasks.md".to_string(),
        line: index,
        description,
        status: TaskStatus::Todo,
        due: due_day.map(|d| chrono::NaiveDate::from_ymd_opt(2025, 1, d).unwrap()),
        priority: Priority::None,
        tags: Vec::new(),
        notes: String::new(),
        created_at: Timestamp::Absent,
        modified_at: Timestamp::Absent,
    }
}

fn make_rem(index: usize, title: String, due_day: Option<u32>) -> ReminderTask {
    ReminderTask {
        id: RemTaskId::from(format!("r{index:03}")),
        list_id: ListId::from("L-default"),
        list_name: "Default".to_string(),
        title,
        status: TaskStatus::Todo,
        due: due_day.map(|d| chrono::NaiveDate::from_ymd_opt(2025, 1, d).unwrap()),
        priority: Priority::None,
        tags: Vec::new(),
        notes: String::new(),
        created_at: Timestamp::Absent,
        modified_at: Timestamp::Absent,
    }
}

fn arb_description() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec![
            "buy", "milk", "call", "alice", "write", "report", "ship", "release",
        ]),
        1..4,
    )
    .prop_map(|words| words.join(" "))
}

fn arb_due() -> impl Strategy<Value = Option<u32>> {
    prop::option::of(1u32..28)
}

proptest! {
    #[test]
    fn matching_is_one_to_one(
        obs_specs in prop::collection::vec((arb_description(), arb_due()), 0..8),
        rem_specs in prop::collection::vec((arb_description(), arb_due()), 0..8),
    ) {
        let obs: Vec<ObsidianTask> = obs_specs
            .into_iter()
            .enumerate()
            .map(|(i, (d, due))| make_obs(i, d, due))
            .collect();
        let rems: Vec<ReminderTask> = rem_specs
            .into_iter()
            .enumerate()
            .map(|(i, (t, due))| make_rem(i, t, due))
            .collect();

        let obs_refs: Vec<&ObsidianTask> = obs.iter().collect();
        let rem_refs: Vec<&ReminderTask> = rems.iter().collect();
        let config = MatcherConfig::default();
        let pairs = match_residuals(&obs_refs, &rem_refs, &config);

        let obs_ids: HashSet<_> = pairs.iter().map(|p| p.obs_id.clone()).collect();
        let rem_ids: HashSet<_> = pairs.iter().map(|p| p.rem_id.clone()).collect();
        prop_assert_eq!(obs_ids.len(), pairs.len());
        prop_assert_eq!(rem_ids.len(), pairs.len());

        for pair in &pairs {
            prop_assert!(pair.score >= config.min_score);
            prop_assert!(pair.score <= 1.0);
        }
    }

    #[test]
    fn matching_ignores_input_order(
        obs_specs in prop::collection::vec((arb_description(), arb_due()), 0..8),
        rem_specs in prop::collection::vec((arb_description(), arb_due()), 0..8),
    ) {
        let obs: Vec<ObsidianTask> = obs_specs
            .into_iter()
            .enumerate()
            .map(|(i, (d, due))| make_obs(i, d, due))
            .collect();
        let rems: Vec<ReminderTask> = rem_specs
            .into_iter()
            .enumerate()
            .map(|(i, (t, due))| make_rem(i, t, due))
            .collect();

        let config = MatcherConfig::default();

        let forward: Vec<&ObsidianTask> = obs.iter().collect();
        let forward_rems: Vec<&ReminderTask> = rems.iter().collect();
        let reversed: Vec<&ObsidianTask> = obs.iter().rev().collect();
        let reversed_rems: Vec<&ReminderTask> = rems.iter().rev().collect();

        let a = match_residuals(&forward, &forward_rems, &config);
        let b = match_residuals(&reversed, &reversed_rems, &config);
        prop_assert_eq!(a, b);
    }
}
