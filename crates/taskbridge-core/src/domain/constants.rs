/// Weight of description similarity in the pair score.
pub const DESCRIPTION_WEIGHT: f64 = 0.6;

/// Weight of due-date proximity in the pair score.
pub const DUE_WEIGHT: f64 = 0.25;

/// Weight of tag overlap in the pair score.
pub const TAG_WEIGHT: f64 = 0.1;

/// Weight of priority equality in the pair score.
pub const PRIORITY_WEIGHT: f64 = 0.05;

/// Minimum score for a proposed link when none is configured.
pub const DEFAULT_MIN_SCORE: f64 = 0.75;

/// Due-date tolerance in days when none is configured.
pub const DEFAULT_DAYS_TOLERANCE: i64 = 1;

/// Minimum score for rewriting a link during identifier-drift recovery.
pub const RECOVERY_MIN_SCORE: f64 = 0.9;

/// Largest `|A|·|B|` solved with the optimal assignment; greedy above.
pub const OPTIMAL_ASSIGNMENT_CAP: usize = 250_000;

/// `|A|·|B|` above which candidate pruning becomes mandatory.
pub const PRUNING_THRESHOLD: usize = 10_000;

/// Candidates kept per row when pruning (by description similarity).
pub const PRUNE_TOP_K: usize = 50;

/// Runs a link survives with a stale Reminders id before retirement.
pub const LINK_GRACE_RUNS: u32 = 1;
