//! Engine configuration: every performance and safety knob of the core.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, TallyError, constants};

/// Tunable limits for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wall-clock time per rule after which a warning is logged.
    /// The rule still runs to completion.
    pub rule_time_budget: Duration,
    /// Optional cooperative deadline per rule for subset searches.
    /// When it passes, searches return their best result so far.
    pub rule_deadline: Option<Duration>,
    /// Expensive rules are skipped when either pool exceeds this size.
    pub expensive_pool_ceiling: usize,
    /// Maximum members on the group side of a subset search.
    pub max_group_size: usize,
    /// Maximum partner candidates considered per anchor.
    pub max_candidates_per_anchor: usize,
    /// Node budget for depth-first backtracking.
    pub max_backtrack_iterations: u64,
    /// Budget for subset-sum enumeration.
    pub max_subset_enumerations: u64,
    /// Partner counts up to this use meet-in-the-middle.
    pub meet_in_middle_threshold: usize,
    /// Maximum transactions per side in one many-to-many cluster.
    pub max_cluster_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rule_time_budget: Duration::from_millis(constants::DEFAULT_RULE_TIME_BUDGET_MS),
            rule_deadline: None,
            expensive_pool_ceiling: constants::DEFAULT_EXPENSIVE_POOL_CEILING,
            max_group_size: constants::DEFAULT_MAX_GROUP_SIZE,
            max_candidates_per_anchor: constants::DEFAULT_MAX_CANDIDATES_PER_ANCHOR,
            max_backtrack_iterations: constants::DEFAULT_MAX_BACKTRACK_ITERATIONS,
            max_subset_enumerations: constants::DEFAULT_MAX_SUBSET_ENUMERATIONS,
            meet_in_middle_threshold: constants::DEFAULT_MEET_IN_MIDDLE_THRESHOLD,
            max_cluster_size: constants::DEFAULT_MAX_CLUSTER_SIZE,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON config document; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would disable matching silently.
    pub fn validate(&self) -> Result<()> {
        let zero_caps = [
            ("max_group_size", self.max_group_size == 0),
            ("max_candidates_per_anchor", self.max_candidates_per_anchor == 0),
            ("max_backtrack_iterations", self.max_backtrack_iterations == 0),
            ("max_subset_enumerations", self.max_subset_enumerations == 0),
            ("max_cluster_size", self.max_cluster_size == 0),
        ];
        if let Some((name, _)) = zero_caps.iter().find(|(_, is_zero)| *is_zero) {
            return Err(TallyError::Configuration(format!("{name} must be > 0")));
        }
        if self.max_group_size < 2 {
            return Err(TallyError::Configuration(
                "max_group_size must be at least 2".into(),
            ));
        }
        Ok(())
    }
}
