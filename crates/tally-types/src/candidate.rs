//! Match candidates produced by the rule handlers.
//!
//! A [`MatchCandidate`] is a proposal, not a commitment: the selector may
//! drop it in favour of a higher-scoring overlapping candidate, and the
//! pipeline may reject it as malformed.

use serde::{Deserialize, Serialize};

use crate::{MinorUnits, RuleId, RuleStrategy, Side, TransactionId};

/// A proposed match between groups of transactions.
///
/// IDs are filed under the side they belong to. An internal match therefore
/// has every ID in one of the two lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub set1_ids: Vec<TransactionId>,
    pub set2_ids: Vec<TransactionId>,
    pub rule_id: RuleId,
    pub rule_priority: i32,
    pub strategy: RuleStrategy,
    /// Confidence in `0..=100`.
    pub score: u8,
    /// Signed residual: sum of every member's comparison amount.
    pub difference: MinorUnits,
}

impl MatchCandidate {
    /// Total number of transactions across both lists.
    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.set1_ids.len() + self.set2_ids.len()
    }

    /// All IDs, Set 1 first.
    pub fn all_ids(&self) -> impl Iterator<Item = TransactionId> + '_ {
        self.set1_ids.iter().chain(self.set2_ids.iter()).copied()
    }

    /// IDs filed under `side`.
    #[must_use]
    pub fn ids_on(&self, side: Side) -> &[TransactionId] {
        match side {
            Side::Set1 => &self.set1_ids,
            Side::Set2 => &self.set2_ids,
        }
    }
}

impl std::fmt::Display for MatchCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Candidate[{}] {}:{} score={} diff={}",
            self.strategy,
            self.set1_ids.len(),
            self.set2_ids.len(),
            self.score,
            self.difference,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_candidate() -> MatchCandidate {
        MatchCandidate {
            set1_ids: vec![TransactionId::from_u128(1)],
            set2_ids: vec![TransactionId::from_u128(2), TransactionId::from_u128(3)],
            rule_id: RuleId::from_u128(10),
            rule_priority: 1,
            strategy: RuleStrategy::ManyToOne,
            score: 88,
            difference: MinorUnits(50),
        }
    }

    #[test]
    fn counts_and_ids() {
        let c = make_candidate();
        assert_eq!(c.transaction_count(), 3);
        let ids: Vec<_> = c.all_ids().collect();
        assert_eq!(ids[0], TransactionId::from_u128(1));
        assert_eq!(ids.len(), 3);
        assert_eq!(c.ids_on(Side::Set2).len(), 2);
    }

    #[test]
    fn display_summarises_shape() {
        let s = make_candidate().to_string();
        assert!(s.contains("MANY_TO_ONE"));
        assert!(s.contains("1:2"));
        assert!(s.contains("0.50"));
    }
}
