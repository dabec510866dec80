//! The sealed input of one pipeline run.
//!
//! A [`PoolSnapshot`] is the point-in-time set of unmatched transactions
//! for one reconciliation unit. Once sealed, its `snapshot_hash` commits to
//! the exact transactions on each side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{IndexedTransaction, Side};

/// Immutable, ID-sorted pools for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Unmatched Set-1 transactions, sorted by ID.
    pub set1: Vec<IndexedTransaction>,
    /// Unmatched Set-2 transactions, sorted by ID.
    pub set2: Vec<IndexedTransaction>,
    /// SHA-256 over both sides in order.
    pub snapshot_hash: [u8; 32],
    pub sealed_at: DateTime<Utc>,
}

impl PoolSnapshot {
    #[must_use]
    pub fn side(&self, side: Side) -> &[IndexedTransaction] {
        match side {
            Side::Set1 => &self.set1,
            Side::Set2 => &self.set2,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.set1.len() + self.set2.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set1.is_empty() && self.set2.is_empty()
    }

    /// Hex form of the snapshot hash, as reported in run summaries.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.snapshot_hash)
    }
}
