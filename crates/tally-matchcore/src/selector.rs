//! Greedy non-overlapping candidate selection.
//!
//! Highest score first; among equal scores the candidate proposed first
//! wins. A candidate is accepted only if none of its transactions was
//! claimed by an earlier acceptance in the same call.

use std::collections::HashSet;

use tally_types::MatchCandidate;

/// Pick a conflict-free subset of `candidates`.
///
/// O(n log n) for the stable sort plus O(n·k) for the claim checks, where
/// k is the candidate size.
#[must_use]
pub fn select_non_overlapping(mut candidates: Vec<MatchCandidate>) -> Vec<MatchCandidate> {
    candidates.sort_by(|a, b| b.score.cmp(&a.score));

    let mut claimed = HashSet::new();
    let mut accepted = Vec::new();
    for candidate in candidates {
        if candidate.all_ids().any(|id| claimed.contains(&id)) {
            continue;
        }
        claimed.extend(candidate.all_ids());
        accepted.push(candidate);
    }
    accepted
}

#[cfg(test)]
mod tests {
    use tally_types::{MinorUnits, RuleId, RuleStrategy, TransactionId};

    use super::*;

    fn candidate(set1: &[u128], set2: &[u128], score: u8) -> MatchCandidate {
        MatchCandidate {
            set1_ids: set1.iter().copied().map(TransactionId::from_u128).collect(),
            set2_ids: set2.iter().copied().map(TransactionId::from_u128).collect(),
            rule_id: RuleId::from_u128(1),
            rule_priority: 1,
            strategy: RuleStrategy::OneToOne,
            score,
            difference: MinorUnits::ZERO,
        }
    }

    #[test]
    fn empty_input() {
        assert!(select_non_overlapping(Vec::new()).is_empty());
    }

    #[test]
    fn higher_score_wins_conflict() {
        let accepted = select_non_overlapping(vec![
            candidate(&[1], &[2], 70),
            candidate(&[1], &[3], 90),
        ]);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].score, 90);
    }

    #[test]
    fn first_seen_wins_ties() {
        let accepted = select_non_overlapping(vec![
            candidate(&[1], &[2], 80),
            candidate(&[1], &[3], 80),
            candidate(&[4], &[3], 80),
        ]);
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].set2_ids, vec![TransactionId::from_u128(2)]);
        assert_eq!(accepted[1].set1_ids, vec![TransactionId::from_u128(4)]);
    }

    #[test]
    fn accepted_candidates_are_disjoint() {
        let accepted = select_non_overlapping(vec![
            candidate(&[1, 2], &[10], 60),
            candidate(&[2], &[11], 95),
            candidate(&[3], &[10, 12], 50),
            candidate(&[4], &[13], 40),
        ]);
        let mut seen = HashSet::new();
        for c in &accepted {
            for id in c.all_ids() {
                assert!(seen.insert(id), "{id} used twice");
            }
        }
        assert_eq!(accepted.len(), 3);
    }
}
