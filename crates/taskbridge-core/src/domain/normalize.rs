//! Text normalization shared by the matcher, the deduplicator, and the
//! link-recovery title hash.
//!
//! Two tasks are duplicates iff their normalizations are byte-equal, so
//! the exact transformation here is part of the contract.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Normalizes a task description: lowercase, leading checkbox markup
/// stripped, whitespace collapsed to single spaces, trimmed.
pub fn normalize_description(raw: &str) -> String {
    let stripped = strip_checkbox(raw);
    let lowered = stripped.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut last_was_space = true;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Strips a leading `- [ ]` / `* [x]` style checkbox from a line.
fn strip_checkbox(raw: &str) -> &str {
    let trimmed = raw.trim_start();
    for bullet in ["- [", "* [", "+ ["] {
        if let Some(rest) = trimmed.strip_prefix(bullet)
            && let Some((state, tail)) = rest.split_once(']')
            && state.chars().count() == 1
        {
            return tail;
        }
    }
    trimmed
}

/// Hex SHA-256 of the normalized title, persisted as a recovery anchor.
pub fn title_hash(title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_description(title).as_bytes());
    hex::encode(hasher.finalize())
}

/// A multiset of word tokens, pre-computed once per task for scoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenBag {
    counts: HashMap<String, usize>,
    total: usize,
}

impl TokenBag {
    /// Tokenizes the normalized form of `text` on word boundaries.
    pub fn new(text: &str) -> Self {
        let normalized = normalize_description(text);
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut total = 0;
        for token in normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            *counts.entry(token.to_string()).or_insert(0) += 1;
            total += 1;
        }
        Self { counts, total }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Dice coefficient over the two token multisets.
    ///
    /// Two empty bags are considered identical (1.0).
    pub fn dice(&self, other: &TokenBag) -> f64 {
        if self.total == 0 && other.total == 0 {
            return 1.0;
        }
        if self.total == 0 || other.total == 0 {
            return 0.0;
        }
        let mut shared = 0usize;
        for (token, count) in &self.counts {
            if let Some(other_count) = other.counts.get(token) {
                shared += count.min(other_count);
            }
        }
        (2.0 * shared as f64) / (self.total + other.total) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_checkbox_and_collapses_whitespace() {
        assert_eq!(normalize_description("- [ ] Buy   milk "), "buy milk");
        assert_eq!(normalize_description("- [x] Buy milk"), "buy milk");
        assert_eq!(normalize_description("* [X]  Call\tAlice"), "call alice");
        assert_eq!(normalize_description("Buy milk"), "buy milk");
    }

    #[test]
    fn test_normalize_is_byte_equal_for_duplicates() {
        let a = normalize_description("- [ ] Call Alice");
        let b = normalize_description("call   ALICE");
        assert_eq!(a, b);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_normalize_keeps_punctuation() {
        assert_eq!(normalize_description("Ship v2.0!"), "ship v2.0!");
    }

    #[test]
    fn test_title_hash_ignores_markup() {
        assert_eq!(title_hash("- [ ] Ship v2"), title_hash("ship  V2"));
        assert_ne!(title_hash("Ship v2"), title_hash("Ship v3"));
    }

    #[test]
    fn test_dice_identical_and_disjoint() {
        let a = TokenBag::new("buy milk");
        let b = TokenBag::new("Buy Milk");
        let c = TokenBag::new("write report");
        assert_eq!(a.dice(&b), 1.0);
        assert_eq!(a.dice(&c), 0.0);
    }

    #[test]
    fn test_dice_partial_overlap() {
        let a = TokenBag::new("buy whole milk");
        let b = TokenBag::new("buy milk");
        // 2 shared tokens of 3 + 2 total.
        assert!((a.dice(&b) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_dice_multiset_counts() {
        let a = TokenBag::new("ping ping ping");
        let b = TokenBag::new("ping ping");
        assert!((a.dice(&b) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_dice_empty_bags() {
        let empty = TokenBag::new("");
        let full = TokenBag::new("milk");
        assert_eq!(empty.dice(&TokenBag::new("   ")), 1.0);
        assert_eq!(empty.dice(&full), 0.0);
    }
}
