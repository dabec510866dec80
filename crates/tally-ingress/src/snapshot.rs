//! Snapshot builder: collects unmatched transactions and seals them.
//!
//! Sealing sorts each side by transaction ID and computes a SHA-256 hash
//! over the ordered content, so two runs can prove they started from the
//! same snapshot.

use std::collections::HashSet;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tally_types::{IndexedTransaction, PoolSnapshot, Result, Side, TallyError, TransactionId};

/// Collects normalized transactions for one run.
///
/// Once sealed, no more transactions can be added.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    set1: Vec<IndexedTransaction>,
    set2: Vec<IndexedTransaction>,
    seen: HashSet<TransactionId>,
}

impl SnapshotBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one transaction to its side's pool.
    ///
    /// # Errors
    /// Returns `DuplicateTransaction` if the ID was already pushed (on
    /// either side).
    pub fn push(&mut self, tx: IndexedTransaction) -> Result<()> {
        if !self.seen.insert(tx.id) {
            return Err(TallyError::DuplicateTransaction(tx.id));
        }
        match tx.side {
            Side::Set1 => self.set1.push(tx),
            Side::Set2 => self.set2.push(tx),
        }
        Ok(())
    }

    /// Push every transaction, stopping at the first duplicate.
    pub fn extend(&mut self, txs: impl IntoIterator<Item = IndexedTransaction>) -> Result<()> {
        for tx in txs {
            self.push(tx)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Sort both sides by ID and hash them into an immutable snapshot.
    #[must_use]
    pub fn seal(self) -> PoolSnapshot {
        let Self {
            mut set1, mut set2, ..
        } = self;
        set1.sort_by_key(|tx| tx.id);
        set2.sort_by_key(|tx| tx.id);
        let snapshot_hash = compute_snapshot_hash(&set1, &set2);

        tracing::debug!(
            set1 = set1.len(),
            set2 = set2.len(),
            hash = %hex::encode(&snapshot_hash[..4]),
            "Snapshot sealed"
        );

        PoolSnapshot {
            set1,
            set2,
            snapshot_hash,
            sealed_at: Utc::now(),
        }
    }
}

/// Recompute the hash of a snapshot and compare it with the stored one.
#[must_use]
pub fn verify_snapshot_hash(snapshot: &PoolSnapshot) -> bool {
    compute_snapshot_hash(&snapshot.set1, &snapshot.set2) == snapshot.snapshot_hash
}

/// SHA-256 over both sides.
///
/// Commits to each transaction's ID, side, amounts and dates, and to every
/// text field the rules can inspect.
fn compute_snapshot_hash(set1: &[IndexedTransaction], set2: &[IndexedTransaction]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"tally:snapshot:v1:");
    for side in [set1, set2] {
        hasher.update((side.len() as u64).to_le_bytes());
        for tx in side {
            hasher.update(tx.id.0.as_bytes());
            hasher.update(match tx.side {
                Side::Set1 => [0u8],
                Side::Set2 => [1u8],
            });
            hasher.update(tx.amount.0.to_le_bytes());
            hash_optional(&mut hasher, tx.foreign_amount.map(|a| a.0.to_le_bytes()));
            hasher.update(tx.date.0.to_le_bytes());
            hash_optional(&mut hasher, tx.secondary_date.map(|d| d.0.to_le_bytes()));
            hasher.update(tx.currency.as_bytes());
            hasher.update([0u8]);
            let texts = [
                &tx.reference,
                &tx.description,
                &tx.text_code,
                &tx.account_number,
            ];
            for text in texts.into_iter().chain(tx.dimensions.iter()) {
                hash_optional(&mut hasher, text.as_ref().map(String::as_bytes));
            }
        }
    }
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Length-prefixed so `None` and `Some("")` hash differently.
fn hash_optional(hasher: &mut Sha256, value: Option<impl AsRef<[u8]>>) {
    match value {
        None => hasher.update([0u8]),
        Some(bytes) => {
            let bytes = bytes.as_ref();
            hasher.update([1u8]);
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
    }
}
