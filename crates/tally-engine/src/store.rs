//! Storage boundary.
//!
//! [`ReconStore`] is everything the engine needs from persistence: the
//! unit's rules, its unmatched transactions, and one atomic write of the
//! match records. [`InMemoryStore`] implements it over plain maps with a
//! staged clone-and-swap commit, so a failed write leaves nothing behind.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_ingress::{RawTransaction, SnapshotBuilder, normalize};
use tally_types::{
    Actor, MatchId, MatchingRule, MinorUnits, PoolSnapshot, Result, RuleId, TallyError,
    TransactionId, UnitId,
};

/// Match status of a stored transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Unmatched,
    Matched,
}

/// One persisted match, attributed to the actor that committed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub unit: UnitId,
    pub rule_id: RuleId,
    pub set1_ids: Vec<TransactionId>,
    pub set2_ids: Vec<TransactionId>,
    pub score: u8,
    pub difference: MinorUnits,
    pub actor: Actor,
    pub matched_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn transaction_ids(&self) -> impl Iterator<Item = TransactionId> + '_ {
        self.set1_ids.iter().chain(&self.set2_ids).copied()
    }
}

/// Persistence collaborator of the engine.
pub trait ReconStore {
    /// All rules of a unit, active or not.
    fn load_rules(&self, unit: UnitId) -> Result<Vec<MatchingRule>>;

    /// Sealed snapshot of the unit's unmatched, non-archived transactions.
    fn load_unmatched(&self, unit: UnitId) -> Result<PoolSnapshot>;

    /// Persist every record and mark its transactions matched, all or
    /// nothing.
    fn commit_matches(&mut self, unit: UnitId, records: &[MatchRecord]) -> Result<()>;
}

/// A stored transaction row with its match state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTransaction {
    pub raw: RawTransaction,
    pub status: MatchStatus,
    pub match_id: Option<MatchId>,
    /// Soft-deleted rows never enter a snapshot.
    pub archived: bool,
}

#[derive(Debug, Clone, Default)]
struct UnitData {
    rules: Vec<MatchingRule>,
    transactions: BTreeMap<TransactionId, StoredTransaction>,
    matches: Vec<MatchRecord>,
}

/// Map-backed store for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    units: HashMap<UnitId, UnitData>,
    /// Fail the next commit once this many records have been staged.
    fail_commit_after: Option<usize>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty unit. Registering twice keeps existing data.
    pub fn add_unit(&mut self, unit: UnitId) {
        self.units.entry(unit).or_default();
    }

    pub fn insert_rule(&mut self, unit: UnitId, rule: MatchingRule) -> Result<()> {
        self.unit_mut(unit)?.rules.push(rule);
        Ok(())
    }

    /// Insert an unmatched transaction row.
    ///
    /// # Errors
    /// `DuplicateTransaction` if the unit already holds the ID.
    pub fn insert_transaction(&mut self, unit: UnitId, raw: RawTransaction) -> Result<()> {
        let data = self.unit_mut(unit)?;
        if data.transactions.contains_key(&raw.id) {
            return Err(TallyError::DuplicateTransaction(raw.id));
        }
        data.transactions.insert(
            raw.id,
            StoredTransaction {
                raw,
                status: MatchStatus::Unmatched,
                match_id: None,
                archived: false,
            },
        );
        Ok(())
    }

    pub fn archive(&mut self, unit: UnitId, id: TransactionId) -> Result<()> {
        let tx = self
            .unit_mut(unit)?
            .transactions
            .get_mut(&id)
            .ok_or(TallyError::TransactionNotFound(id))?;
        tx.archived = true;
        Ok(())
    }

    #[must_use]
    pub fn transaction(&self, unit: UnitId, id: TransactionId) -> Option<&StoredTransaction> {
        self.units.get(&unit)?.transactions.get(&id)
    }

    /// Committed match records of a unit, in commit order.
    #[must_use]
    pub fn matches(&self, unit: UnitId) -> &[MatchRecord] {
        self.units.get(&unit).map_or(&[], |d| d.matches.as_slice())
    }

    /// Make the next commit fail after `records` records were staged.
    pub fn fail_next_commit_after(&mut self, records: usize) {
        self.fail_commit_after = Some(records);
    }

    fn unit(&self, unit: UnitId) -> Result<&UnitData> {
        self.units.get(&unit).ok_or(TallyError::UnitNotFound(unit))
    }

    fn unit_mut(&mut self, unit: UnitId) -> Result<&mut UnitData> {
        self.units
            .get_mut(&unit)
            .ok_or(TallyError::UnitNotFound(unit))
    }
}

impl ReconStore for InMemoryStore {
    fn load_rules(&self, unit: UnitId) -> Result<Vec<MatchingRule>> {
        Ok(self.unit(unit)?.rules.clone())
    }

    fn load_unmatched(&self, unit: UnitId) -> Result<PoolSnapshot> {
        let data = self.unit(unit)?;
        let mut builder = SnapshotBuilder::new();
        for stored in data.transactions.values() {
            if stored.archived || stored.status == MatchStatus::Matched {
                continue;
            }
            builder.push(normalize(&stored.raw)?)?;
        }
        Ok(builder.seal())
    }

    fn commit_matches(&mut self, unit: UnitId, records: &[MatchRecord]) -> Result<()> {
        let fail_after = self.fail_commit_after.take();
        let data = self.unit_mut(unit)?;

        // Stage on a copy; swap in only when every record applied.
        let mut transactions = data.transactions.clone();
        let mut matches = data.matches.clone();
        for (staged, record) in records.iter().enumerate() {
            if fail_after == Some(staged) {
                return Err(TallyError::CommitFailed {
                    reason: format!("injected failure after {staged} record(s)"),
                });
            }
            for id in record.transaction_ids() {
                let tx = transactions
                    .get_mut(&id)
                    .ok_or(TallyError::TransactionNotFound(id))?;
                if tx.status == MatchStatus::Matched || tx.archived {
                    return Err(TallyError::TransactionAlreadyMatched(id));
                }
                tx.status = MatchStatus::Matched;
                tx.match_id = Some(record.id);
            }
            matches.push(record.clone());
        }

        data.transactions = transactions;
        data.matches = matches;
        tracing::debug!(unit = %unit, records = records.len(), "Match records committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tally_types::{RuleType, Side};

    use super::*;

    fn raw(id: u128, side: Side, amount: i64) -> RawTransaction {
        RawTransaction {
            id: TransactionId::from_u128(id),
            side,
            amount: Decimal::new(amount, 2),
            foreign_amount: None,
            date: NaiveDate::from_ymd_opt(2022, 1, 8).unwrap(),
            secondary_date: None,
            reference: None,
            description: None,
            text_code: None,
            account_number: None,
            currency: "NOK".into(),
            dimensions: Vec::new(),
        }
    }

    fn record(unit: UnitId, seq: u64, set1: u128, set2: u128) -> MatchRecord {
        MatchRecord {
            id: MatchId::deterministic(&[7; 32], seq),
            unit,
            rule_id: RuleId::from_u128(1),
            set1_ids: vec![TransactionId::from_u128(set1)],
            set2_ids: vec![TransactionId::from_u128(set2)],
            score: 100,
            difference: MinorUnits::ZERO,
            actor: Actor::Agent("test".into()),
            matched_at: Utc::now(),
        }
    }

    fn store() -> (InMemoryStore, UnitId) {
        let unit = UnitId::from_u128(1);
        let mut store = InMemoryStore::new();
        store.add_unit(unit);
        store.insert_transaction(unit, raw(1, Side::Set1, 100)).unwrap();
        store.insert_transaction(unit, raw(2, Side::Set2, -100)).unwrap();
        store.insert_transaction(unit, raw(3, Side::Set1, 50)).unwrap();
        store.insert_transaction(unit, raw(4, Side::Set2, -50)).unwrap();
        store
            .insert_rule(unit, MatchingRule::dummy(1, 1, RuleType::OneToOne))
            .unwrap();
        (store, unit)
    }

    #[test]
    fn unknown_unit() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.load_rules(UnitId::from_u128(9)),
            Err(TallyError::UnitNotFound(_))
        ));
    }

    #[test]
    fn snapshot_excludes_archived_rows() {
        let (mut store, unit) = store();
        store.archive(unit, TransactionId::from_u128(3)).unwrap();
        let snapshot = store.load_unmatched(unit).unwrap();
        assert_eq!(snapshot.set1.len(), 1);
        assert_eq!(snapshot.set2.len(), 2);
        assert_eq!(snapshot.set1[0].amount, MinorUnits(100));
    }

    #[test]
    fn duplicate_rows_rejected() {
        let (mut store, unit) = store();
        assert!(matches!(
            store.insert_transaction(unit, raw(1, Side::Set2, 1)),
            Err(TallyError::DuplicateTransaction(_))
        ));
    }

    #[test]
    fn commit_marks_rows_and_shrinks_snapshot() {
        let (mut store, unit) = store();
        let rec = record(unit, 0, 1, 2);
        store.commit_matches(unit, &[rec.clone()]).unwrap();
        let row = store.transaction(unit, TransactionId::from_u128(1)).unwrap();
        assert_eq!(row.status, MatchStatus::Matched);
        assert_eq!(row.match_id, Some(rec.id));
        assert_eq!(store.matches(unit).len(), 1);
        assert_eq!(store.load_unmatched(unit).unwrap().len(), 2);
    }

    #[test]
    fn failed_commit_leaves_no_trace() {
        let (mut store, unit) = store();
        store.fail_next_commit_after(1);
        let err = store
            .commit_matches(unit, &[record(unit, 0, 1, 2), record(unit, 1, 3, 4)])
            .unwrap_err();
        assert!(matches!(err, TallyError::CommitFailed { .. }));
        assert!(store.matches(unit).is_empty());
        for id in 1..=4 {
            let row = store.transaction(unit, TransactionId::from_u128(id)).unwrap();
            assert_eq!(row.status, MatchStatus::Unmatched);
        }
        // The injected failure is one-shot.
        store.commit_matches(unit, &[record(unit, 0, 1, 2)]).unwrap();
    }

    #[test]
    fn rematching_a_row_fails_whole_commit() {
        let (mut store, unit) = store();
        store.commit_matches(unit, &[record(unit, 0, 1, 2)]).unwrap();
        let err = store
            .commit_matches(unit, &[record(unit, 1, 3, 4), record(unit, 2, 1, 4)])
            .unwrap_err();
        assert!(matches!(err, TallyError::TransactionAlreadyMatched(_)));
        let row = store.transaction(unit, TransactionId::from_u128(3)).unwrap();
        assert_eq!(row.status, MatchStatus::Unmatched);
    }
}
