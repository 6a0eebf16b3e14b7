//! Intra-store duplicate detection.
//!
//! Tasks cluster by byte-equal normalized description. Anything that
//! participates in a link (existing or freshly proposed) is excluded up
//! front, so a surfaced cluster only ever contains disposable residuals.

use std::collections::{BTreeMap, HashSet};

use crate::domain::normalize::normalize_description;

/// A group of same-description tasks within one store.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateCluster<I> {
    /// The shared normalized description.
    pub normalized: String,
    /// Member ids in sorted order.
    pub member_ids: Vec<I>,
}

/// Clusters `(id, description)` pairs, skipping `excluded` ids.
///
/// Only clusters of two or more members are returned, ordered by their
/// normalized key; members are ordered by id.
pub fn find_clusters<I>(items: &[(I, &str)], excluded: &HashSet<I>) -> Vec<DuplicateCluster<I>>
where
    I: Clone + Ord + std::hash::Hash,
{
    let mut groups: BTreeMap<String, Vec<I>> = BTreeMap::new();
    for (id, description) in items {
        if excluded.contains(id) {
            continue;
        }
        let key = normalize_description(description);
        if key.is_empty() {
            continue;
        }
        groups.entry(key).or_default().push(id.clone());
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|(normalized, mut member_ids)| {
            member_ids.sort();
            DuplicateCluster {
                normalized,
                member_ids,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObsTaskId;

    fn ids(v: &[&str]) -> Vec<ObsTaskId> {
        v.iter().map(|s| ObsTaskId::from(*s)).collect()
    }

    #[test]
    fn test_clusters_by_normalized_description() {
        let items = vec![
            (ObsTaskId::from("o1"), "Call Alice"),
            (ObsTaskId::from("o2"), "call   alice"),
            (ObsTaskId::from("o3"), "Call Bob"),
        ];
        let clusters = find_clusters(&items, &HashSet::new());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].normalized, "call alice");
        assert_eq!(clusters[0].member_ids, ids(&["o1", "o2"]));
    }

    #[test]
    fn test_linked_members_are_excluded() {
        // o5a is linked; the surfaced cluster must only contain o5b/o5c.
        let items = vec![
            (ObsTaskId::from("o5a"), "Call Alice"),
            (ObsTaskId::from("o5b"), "Call Alice"),
            (ObsTaskId::from("o5c"), "call alice"),
        ];
        let excluded: HashSet<ObsTaskId> = [ObsTaskId::from("o5a")].into_iter().collect();
        let clusters = find_clusters(&items, &excluded);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].member_ids, ids(&["o5b", "o5c"]));
    }

    #[test]
    fn test_exclusion_can_dissolve_a_cluster() {
        let items = vec![
            (ObsTaskId::from("o1"), "Call Alice"),
            (ObsTaskId::from("o2"), "Call Alice"),
        ];
        let excluded: HashSet<ObsTaskId> = [ObsTaskId::from("o1")].into_iter().collect();
        assert!(find_clusters(&items, &excluded).is_empty());
    }

    #[test]
    fn test_singletons_and_empty_descriptions_ignored() {
        let items = vec![
            (ObsTaskId::from("o1"), "Unique"),
            (ObsTaskId::from("o2"), "  "),
            (ObsTaskId::from("o3"), ""),
        ];
        assert!(find_clusters(&items, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_cluster_order_is_stable() {
        let items = vec![
            (ObsTaskId::from("z2"), "beta task"),
            (ObsTaskId::from("z1"), "beta task"),
            (ObsTaskId::from("a2"), "alpha task"),
            (ObsTaskId::from("a1"), "alpha task"),
        ];
        let clusters = find_clusters(&items, &HashSet::new());
        assert_eq!(clusters[0].normalized, "alpha task");
        assert_eq!(clusters[0].member_ids, ids(&["a1", "a2"]));
        assert_eq!(clusters[1].normalized, "beta task");
        assert_eq!(clusters[1].member_ids, ids(&["z1", "z2"]));
    }
}
