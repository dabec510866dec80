//! Pipeline context: the shrinking pools plus the committed candidates.
//!
//! Handlers only ever borrow the context immutably. The pipeline driver is
//! the single writer, through [`PipelineContext::commit`], so a transaction
//! can never end up in two committed candidates.

use std::collections::{BTreeMap, HashSet};

use tally_types::{
    IndexedTransaction, MatchCandidate, PoolSnapshot, Result, Side, TallyError, TransactionId,
};

/// Working state of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    set1: BTreeMap<TransactionId, IndexedTransaction>,
    set2: BTreeMap<TransactionId, IndexedTransaction>,
    committed: Vec<MatchCandidate>,
}

impl PipelineContext {
    /// Seed both pools from a sealed snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &PoolSnapshot) -> Self {
        Self::from_transactions(snapshot.set1.iter().chain(&snapshot.set2).cloned())
    }

    /// Seed both pools from loose transactions, filed by their side.
    /// A repeated ID keeps the last transaction seen.
    #[must_use]
    pub fn from_transactions(txs: impl IntoIterator<Item = IndexedTransaction>) -> Self {
        let mut ctx = Self::default();
        for tx in txs {
            match tx.side {
                Side::Set1 => ctx.set1.insert(tx.id, tx),
                Side::Set2 => ctx.set2.insert(tx.id, tx),
            };
        }
        ctx
    }

    /// Unmatched transactions on one side, in ID order.
    #[must_use]
    pub fn pool(&self, side: Side) -> &BTreeMap<TransactionId, IndexedTransaction> {
        match side {
            Side::Set1 => &self.set1,
            Side::Set2 => &self.set2,
        }
    }

    /// Look up an unmatched transaction on either side.
    #[must_use]
    pub fn get(&self, id: TransactionId) -> Option<&IndexedTransaction> {
        self.set1.get(&id).or_else(|| self.set2.get(&id))
    }

    #[must_use]
    pub fn contains(&self, id: TransactionId) -> bool {
        self.get(id).is_some()
    }

    /// Size of the larger pool. Drives the expensive-rule ceiling.
    #[must_use]
    pub fn largest_pool(&self) -> usize {
        self.set1.len().max(self.set2.len())
    }

    #[must_use]
    pub fn unmatched(&self) -> usize {
        self.set1.len() + self.set2.len()
    }

    /// Candidates committed so far, in commit order.
    #[must_use]
    pub fn committed(&self) -> &[MatchCandidate] {
        &self.committed
    }

    /// Consume the context, returning the committed candidates.
    #[must_use]
    pub fn into_committed(self) -> Vec<MatchCandidate> {
        self.committed
    }

    /// Accept a candidate and remove its transactions from the pools.
    ///
    /// # Errors
    /// `MalformedCandidate` if the candidate has fewer than two
    /// transactions, repeats an ID, files an ID on the wrong side, or
    /// names a transaction that is no longer unmatched. The context is
    /// left unchanged on error.
    pub fn commit(&mut self, candidate: MatchCandidate) -> Result<()> {
        let malformed = |reason: String| TallyError::MalformedCandidate {
            rule_id: candidate.rule_id,
            reason,
        };
        if candidate.transaction_count() < 2 {
            return Err(malformed(format!(
                "{} transaction(s), need at least 2",
                candidate.transaction_count()
            )));
        }
        let mut seen = HashSet::with_capacity(candidate.transaction_count());
        for side in Side::BOTH {
            for id in candidate.ids_on(side) {
                if !seen.insert(*id) {
                    return Err(malformed(format!("{id} listed twice")));
                }
                if !self.pool(side).contains_key(id) {
                    return Err(malformed(format!("{id} is not unmatched on {side}")));
                }
            }
        }

        for id in &candidate.set1_ids {
            self.set1.remove(id);
        }
        for id in &candidate.set2_ids {
            self.set2.remove(id);
        }
        self.committed.push(candidate);
        Ok(())
    }
}
