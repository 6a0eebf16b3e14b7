//! Assignment strategies for the matcher.
//!
//! Both strategies consume the same sparse candidate list and return a
//! partial matching in which every row and column appears at most once.
//! Optimal is an O(n³) Kuhn–Munkres solve over the dense cost matrix
//! `1 − score`; greedy takes candidates largest-first. Both are fully
//! deterministic: candidate indices come from id-sorted task arrays, so
//! index order is lexicographic id order.

use crate::domain::constants::OPTIMAL_ASSIGNMENT_CAP;

/// Cost assigned to pairs outside the candidate set. Large enough that no
/// sum of real costs (each ≤ 1.0) can make a non-candidate worthwhile.
const NON_CANDIDATE_COST: f64 = 1.0e6;

/// How an assignment round is solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Optimal,
    Greedy,
}

/// Picks the strategy from the problem size.
pub fn choose_strategy(rows: usize, cols: usize) -> Strategy {
    if rows.saturating_mul(cols) <= OPTIMAL_ASSIGNMENT_CAP {
        Strategy::Optimal
    } else {
        Strategy::Greedy
    }
}

/// Selects a matching from `candidates` (`(row, col, score)` triples).
///
/// Returned pairs are restricted to the candidate set and sorted by
/// `(row, col)`.
pub fn assign(
    rows: usize,
    cols: usize,
    candidates: &[(usize, usize, f64)],
    strategy: Strategy,
) -> Vec<(usize, usize)> {
    if rows == 0 || cols == 0 || candidates.is_empty() {
        return Vec::new();
    }
    let mut pairs = match strategy {
        Strategy::Optimal => assign_optimal(rows, cols, candidates),
        Strategy::Greedy => assign_greedy(candidates),
    };
    pairs.sort_unstable();
    pairs
}

fn assign_optimal(rows: usize, cols: usize, candidates: &[(usize, usize, f64)]) -> Vec<(usize, usize)> {
    // Kuhn–Munkres wants rows ≤ cols; transpose when it is the other way.
    let transposed = rows > cols;
    let (n, m) = if transposed { (cols, rows) } else { (rows, cols) };

    let mut cost = vec![NON_CANDIDATE_COST; n * m];
    let mut candidate = vec![false; n * m];
    for &(r, c, score) in candidates {
        let (i, j) = if transposed { (c, r) } else { (r, c) };
        cost[i * m + j] = 1.0 - score.clamp(0.0, 1.0);
        candidate[i * m + j] = true;
    }

    let matched_row_for_col = kuhn_munkres(n, m, &cost);

    let mut pairs = Vec::new();
    for (j, &row) in matched_row_for_col.iter().enumerate() {
        let Some(i) = row else { continue };
        if !candidate[i * m + j] {
            continue;
        }
        pairs.push(if transposed { (j, i) } else { (i, j) });
    }
    pairs
}

/// Minimum-cost complete assignment of `n` rows onto `m ≥ n` columns via
/// shortest augmenting paths over dual potentials.
///
/// Returns, per column, the matched row (if any).
fn kuhn_munkres(n: usize, m: usize, cost: &[f64]) -> Vec<Option<usize>> {
    debug_assert!(n <= m);
    debug_assert_eq!(cost.len(), n * m);

    // 1-indexed working arrays; index 0 is the sentinel column/row.
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; m + 1];
    let mut matched = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        matched[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = matched[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;
            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = cost[(i0 - 1) * m + (j - 1)] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=m {
                if used[j] {
                    u[matched[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if matched[j0] == 0 {
                break;
            }
        }

        // Walk the augmenting path back to the sentinel.
        loop {
            let j1 = way[j0];
            matched[j0] = matched[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    (1..=m)
        .map(|j| {
            let row = matched[j];
            if row == 0 { None } else { Some(row - 1) }
        })
        .collect()
}

fn assign_greedy(candidates: &[(usize, usize, f64)]) -> Vec<(usize, usize)> {
    let mut ordered: Vec<&(usize, usize, f64)> = candidates.iter().collect();
    ordered.sort_by(|a, b| {
        b.2.partial_cmp(&a.2)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (a.0, a.1).cmp(&(b.0, b.1)))
    });

    let mut used_rows = std::collections::HashSet::new();
    let mut used_cols = std::collections::HashSet::new();
    let mut pairs = Vec::new();
    for &&(r, c, _) in &ordered {
        if used_rows.contains(&r) || used_cols.contains(&c) {
            continue;
        }
        used_rows.insert(r);
        used_cols.insert(c);
        pairs.push((r, c));
    }
    pairs
}
