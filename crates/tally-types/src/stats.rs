//! Run statistics returned to callers.
//!
//! These are the only values that outlive a pipeline run besides the
//! accepted candidates themselves.

use serde::{Deserialize, Serialize};

use crate::{RuleId, TransactionId};

/// Why a rule produced nothing without running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SkipReason {
    /// The pool was larger than the expensive-rule ceiling.
    PoolTooLarge { pool_size: usize, ceiling: usize },
    /// The rule failed validation.
    InvalidRule { message: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PoolTooLarge { pool_size, ceiling } => {
                write!(f, "pool size {pool_size} exceeds ceiling {ceiling}")
            }
            Self::InvalidRule { message } => write!(f, "invalid rule: {message}"),
        }
    }
}

/// Per-rule outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleStats {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub priority: i32,
    /// Accepted candidates committed to the run.
    pub matches: usize,
    /// Transactions covered by those candidates.
    pub transactions: usize,
    /// Candidates rejected as malformed.
    pub rejected: usize,
    pub elapsed_ms: u64,
    /// `true` when the rule ran past the time budget.
    pub over_budget: bool,
    pub skipped: Option<SkipReason>,
}

/// Aggregate statistics: the preview result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_matches: usize,
    pub total_transactions: usize,
    pub rules: Vec<RuleStats>,
    pub elapsed_ms: u64,
    /// Hex-encoded hash of the snapshot the run started from.
    pub snapshot_hash: String,
    /// Hex-encoded hash over the accepted candidates.
    pub match_root: String,
}

impl RunSummary {
    /// Rules that were skipped, with their reasons.
    pub fn skipped_rules(&self) -> impl Iterator<Item = (&RuleStats, &SkipReason)> {
        self.rules
            .iter()
            .filter_map(|r| r.skipped.as_ref().map(|reason| (r, reason)))
    }

    /// `true` when at least one rule was skipped (success with a warning).
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.rules
            .iter()
            .any(|r| r.skipped.is_some() || r.over_budget)
    }
}

/// One committed group, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchGroup {
    pub set1_ids: Vec<TransactionId>,
    pub set2_ids: Vec<TransactionId>,
    pub rule_id: RuleId,
    pub score: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(skipped: Option<SkipReason>) -> RuleStats {
        RuleStats {
            rule_id: RuleId::from_u128(1),
            rule_name: "r".into(),
            priority: 1,
            matches: 0,
            transactions: 0,
            rejected: 0,
            elapsed_ms: 0,
            over_budget: false,
            skipped,
        }
    }

    #[test]
    fn warnings_reflect_skips() {
        let mut summary = RunSummary {
            total_matches: 0,
            total_transactions: 0,
            rules: vec![stats(None)],
            elapsed_ms: 1,
            snapshot_hash: String::new(),
            match_root: String::new(),
        };
        assert!(!summary.has_warnings());
        summary.rules.push(stats(Some(SkipReason::PoolTooLarge {
            pool_size: 5001,
            ceiling: 5000,
        })));
        assert!(summary.has_warnings());
        assert_eq!(summary.skipped_rules().count(), 1);
    }

    #[test]
    fn skip_reason_display() {
        let reason = SkipReason::PoolTooLarge {
            pool_size: 5001,
            ceiling: 5000,
        };
        assert_eq!(reason.to_string(), "pool size 5001 exceeds ceiling 5000");
    }
}
