//! Balance check: the invariant enforced on every candidate before commit.
//!
//! ```text
//! ∀ candidate: |Σ comparison amounts of its transactions| ≤ rule tolerance
//!              and Σ == candidate.difference
//! ```
//!
//! The sum is recomputed from the sealed snapshot, not taken from the
//! candidate. A violation aborts the commit before anything is written.

use std::collections::HashMap;

use tally_types::{
    IndexedTransaction, MatchCandidate, MatchingRule, MinorUnits, PoolSnapshot, Result, RuleId,
    TallyError, TransactionId,
};

/// Snapshot-backed verifier for one run.
pub struct BalanceCheck<'a> {
    transactions: HashMap<TransactionId, &'a IndexedTransaction>,
    rules: HashMap<RuleId, &'a MatchingRule>,
}

impl<'a> BalanceCheck<'a> {
    #[must_use]
    pub fn new(snapshot: &'a PoolSnapshot, rules: &'a [MatchingRule]) -> Self {
        Self {
            transactions: snapshot
                .set1
                .iter()
                .chain(&snapshot.set2)
                .map(|tx| (tx.id, tx))
                .collect(),
            rules: rules.iter().map(|r| (r.id, r)).collect(),
        }
    }

    /// Recompute a candidate's residual under its rule's comparison amount.
    ///
    /// # Errors
    /// - `TransactionNotFound` if an ID is not in the snapshot
    /// - `MalformedCandidate` if the rule is unknown or a member lacks the
    ///   compared amount
    pub fn residual(&self, candidate: &MatchCandidate) -> Result<MinorUnits> {
        let rule = self.rule(candidate)?;
        let mut sum = MinorUnits::ZERO;
        for id in candidate.all_ids() {
            let tx = self
                .transactions
                .get(&id)
                .ok_or(TallyError::TransactionNotFound(id))?;
            sum += tx.comparison_amount(rule.compare_currency).ok_or_else(|| {
                TallyError::MalformedCandidate {
                    rule_id: rule.id,
                    reason: format!("{id} has no comparison amount"),
                }
            })?;
        }
        Ok(sum)
    }

    /// Verify one candidate.
    ///
    /// # Errors
    /// Returns [`TallyError::BalanceViolation`] if the recomputed residual
    /// exceeds the rule's tolerance, or [`TallyError::MalformedCandidate`]
    /// if it disagrees with the candidate's recorded difference.
    pub fn verify(&self, candidate: &MatchCandidate) -> Result<()> {
        let rule = self.rule(candidate)?;
        let residual = self.residual(candidate)?;
        let tolerance = rule.effective_tolerance();
        if residual.abs() > tolerance {
            return Err(TallyError::BalanceViolation {
                rule_id: rule.id,
                residual: residual.0,
                tolerance: tolerance.0,
            });
        }
        if residual != candidate.difference {
            return Err(TallyError::MalformedCandidate {
                rule_id: rule.id,
                reason: format!(
                    "recorded difference {} but transactions sum to {residual}",
                    candidate.difference
                ),
            });
        }
        Ok(())
    }

    /// Verify every candidate, stopping at the first violation.
    pub fn verify_all(&self, candidates: &[MatchCandidate]) -> Result<()> {
        candidates.iter().try_for_each(|c| self.verify(c))
    }

    fn rule(&self, candidate: &MatchCandidate) -> Result<&'a MatchingRule> {
        self.rules
            .get(&candidate.rule_id)
            .copied()
            .ok_or_else(|| TallyError::MalformedCandidate {
                rule_id: candidate.rule_id,
                reason: "rule not in the loaded rule set".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tally_types::{RuleStrategy, RuleType, Side};

    use super::*;

    fn snapshot() -> PoolSnapshot {
        PoolSnapshot {
            set1: vec![IndexedTransaction::dummy(1, Side::Set1, -15000, 0)],
            set2: vec![
                IndexedTransaction::dummy(2, Side::Set2, 5000, 0),
                IndexedTransaction::dummy(3, Side::Set2, 5000, 0),
                IndexedTransaction::dummy(4, Side::Set2, 5050, 0),
            ],
            snapshot_hash: [0; 32],
            sealed_at: Utc::now(),
        }
    }

    fn candidate(set2: &[u128], difference: i64) -> MatchCandidate {
        MatchCandidate {
            set1_ids: vec![TransactionId::from_u128(1)],
            set2_ids: set2.iter().copied().map(TransactionId::from_u128).collect(),
            rule_id: RuleId::from_u128(9),
            rule_priority: 1,
            strategy: RuleStrategy::ManyToOne,
            score: 50,
            difference: MinorUnits(difference),
        }
    }

    #[test]
    fn within_tolerance_passes() {
        let snap = snapshot();
        let rules = [MatchingRule::dummy(9, 1, RuleType::ManyToOne).with_tolerance(50)];
        let check = BalanceCheck::new(&snap, &rules);
        check.verify(&candidate(&[2, 3, 4], 50)).unwrap();
        assert_eq!(check.residual(&candidate(&[2, 3], 0)).unwrap(), MinorUnits(-5000));
    }

    #[test]
    fn over_tolerance_is_violation() {
        let snap = snapshot();
        let rules = [MatchingRule::dummy(9, 1, RuleType::ManyToOne).with_tolerance(49)];
        let check = BalanceCheck::new(&snap, &rules);
        let err = check.verify(&candidate(&[2, 3, 4], 50)).unwrap_err();
        assert!(matches!(
            err,
            TallyError::BalanceViolation {
                residual: 50,
                tolerance: 49,
                ..
            }
        ));
    }

    #[test]
    fn misreported_difference_rejected() {
        let snap = snapshot();
        let rules = [MatchingRule::dummy(9, 1, RuleType::ManyToOne).with_tolerance(50)];
        let check = BalanceCheck::new(&snap, &rules);
        let err = check.verify(&candidate(&[2, 3, 4], 0)).unwrap_err();
        assert!(matches!(err, TallyError::MalformedCandidate { .. }));
    }

    #[test]
    fn unknown_transaction_rejected() {
        let snap = snapshot();
        let rules = [MatchingRule::dummy(9, 1, RuleType::ManyToOne)];
        let check = BalanceCheck::new(&snap, &rules);
        let err = check.verify_all(&[candidate(&[77], 0)]).unwrap_err();
        assert!(matches!(err, TallyError::TransactionNotFound(_)));
    }
}
