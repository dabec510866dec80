//! Engine-wide constants for the Tally matching engine.

/// Minor units per major currency unit (øre per krone).
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

/// Largest amount magnitude accepted at ingestion, in minor units
/// (10 trillion major units).
pub const MAX_ABS_MINOR_UNITS: i64 = 1_000_000_000_000_000;

/// Maximum number of named dimension tags carried by one transaction.
pub const MAX_DIMENSIONS: usize = 10;

/// Default per-rule wall-clock warning threshold in milliseconds.
pub const DEFAULT_RULE_TIME_BUDGET_MS: u64 = 5_000;

/// Default ceiling on the per-side pool size above which expensive
/// (many-to-one / many-to-many) rules are skipped.
pub const DEFAULT_EXPENSIVE_POOL_CEILING: usize = 5_000;

/// Default maximum number of transactions on the group side of a subset search.
pub const DEFAULT_MAX_GROUP_SIZE: usize = 8;

/// Default maximum number of partner candidates considered per anchor.
pub const DEFAULT_MAX_CANDIDATES_PER_ANCHOR: usize = 40;

/// Default iteration cap for depth-first backtracking.
pub const DEFAULT_MAX_BACKTRACK_ITERATIONS: u64 = 100_000;

/// Default cap on subset-sum enumerations (meet-in-the-middle and many-to-many).
pub const DEFAULT_MAX_SUBSET_ENUMERATIONS: u64 = 50_000;

/// Partner counts at or below this use meet-in-the-middle; above it,
/// bounded backtracking.
pub const DEFAULT_MEET_IN_MIDDLE_THRESHOLD: usize = 20;

/// Default maximum number of transactions per side in one many-to-many cluster.
pub const DEFAULT_MAX_CLUSTER_SIZE: usize = 12;

/// How many search steps pass between deadline checks.
pub const DEADLINE_CHECK_INTERVAL: u64 = 256;

/// Scorer weight: amount exactness.
pub const SCORE_WEIGHT_AMOUNT: f64 = 40.0;

/// Scorer weight: date proximity.
pub const SCORE_WEIGHT_DATE: f64 = 30.0;

/// Scorer weight: reference similarity.
pub const SCORE_WEIGHT_REFERENCE: f64 = 15.0;

/// Scorer weight: description similarity.
pub const SCORE_WEIGHT_DESCRIPTION: f64 = 10.0;

/// Scorer weight: transaction-count bonus.
pub const SCORE_WEIGHT_COUNT: f64 = 5.0;

/// Highest possible confidence score.
pub const MAX_SCORE: u8 = 100;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Tally";
