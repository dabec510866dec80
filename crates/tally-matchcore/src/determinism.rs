//! Determinism checks for pipeline output.
//!
//! Two runs over the same snapshot and rules must commit the same
//! candidates in the same order. The match root is a SHA-256 over the
//! committed list, so runs can be compared without diffing payloads.

use sha2::{Digest, Sha256};
use tally_types::{MatchCandidate, RuleStrategy};

/// Hash the committed candidates, in order.
///
/// Covers each candidate's IDs per side, rule, strategy, score and
/// difference.
#[must_use]
pub fn compute_match_root(candidates: &[MatchCandidate]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"tally:match_root:v1:");
    hasher.update((candidates.len() as u64).to_le_bytes());

    for candidate in candidates {
        for ids in [&candidate.set1_ids, &candidate.set2_ids] {
            hasher.update((ids.len() as u64).to_le_bytes());
            for id in ids {
                hasher.update(id.0.as_bytes());
            }
        }
        hasher.update(candidate.rule_id.0.as_bytes());
        hasher.update(candidate.rule_priority.to_le_bytes());
        hasher.update([strategy_tag(candidate.strategy)]);
        hasher.update([candidate.score]);
        hasher.update(candidate.difference.0.to_le_bytes());
    }

    let result = hasher.finalize();
    let mut root = [0u8; 32];
    root.copy_from_slice(&result);
    root
}

/// Recompute the root and compare.
#[must_use]
pub fn verify_match_root(candidates: &[MatchCandidate], expected_root: &[u8; 32]) -> bool {
    compute_match_root(candidates) == *expected_root
}

fn strategy_tag(strategy: RuleStrategy) -> u8 {
    match strategy {
        RuleStrategy::OneToOne => 0,
        RuleStrategy::ManyToOne => 1,
        RuleStrategy::ManyToMany => 2,
        RuleStrategy::InternalOneToOne => 3,
        RuleStrategy::InternalManyToOne => 4,
    }
}
