//! Claim ledger: each transaction can be claimed by at most one match.
//!
//! The pipeline already guarantees this within a run. The ledger re-checks
//! it over the exact records about to be written, so a defect upstream
//! surfaces as [`TallyError::TransactionAlreadyMatched`] instead of a
//! corrupt commit.

use std::collections::HashMap;

use tally_types::{MatchId, Result, TallyError, TransactionId};

/// Transaction → owning match, for one commit.
#[derive(Debug, Default)]
pub struct ClaimLedger {
    claims: HashMap<TransactionId, MatchId>,
}

impl ClaimLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `tx_id` for `match_id`.
    ///
    /// # Errors
    /// Returns [`TallyError::TransactionAlreadyMatched`] if another match
    /// already holds the transaction.
    pub fn claim(&mut self, tx_id: TransactionId, match_id: MatchId) -> Result<()> {
        if let Some(owner) = self.claims.get(&tx_id) {
            tracing::warn!(tx = %tx_id, owner = %owner, claimant = %match_id, "Double claim");
            return Err(TallyError::TransactionAlreadyMatched(tx_id));
        }
        self.claims.insert(tx_id, match_id);
        Ok(())
    }

    /// Claim every ID for one match, all or none.
    pub fn claim_all(
        &mut self,
        ids: impl IntoIterator<Item = TransactionId>,
        match_id: MatchId,
    ) -> Result<()> {
        let ids: Vec<TransactionId> = ids.into_iter().collect();
        let mut staged = HashMap::with_capacity(ids.len());
        for id in ids {
            if self.claims.contains_key(&id) || staged.insert(id, match_id).is_some() {
                return Err(TallyError::TransactionAlreadyMatched(id));
            }
        }
        self.claims.extend(staged);
        Ok(())
    }

    #[must_use]
    pub fn owner(&self, tx_id: TransactionId) -> Option<MatchId> {
        self.claims.get(&tx_id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
