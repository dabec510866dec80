//! Hash indexes over one pool snapshot.
//!
//! Rebuilt per rule because the keys depend on the rule (home or foreign
//! amount, primary or secondary date) and because pools shrink between
//! rules. Building is O(n); lookups are O(1) amortized plus the size of the
//! returned ID set.
//!
//! ID sets are `BTreeSet`s so every walk over them is in ID order.

use std::collections::{BTreeSet, HashMap};

use tally_types::{EpochDay, IndexedTransaction, MatchingRule, MinorUnits, TransactionId};

/// Lookup structures keyed by the rule's comparison amount and date.
#[derive(Debug, Default)]
pub struct TransactionIndexes<'a> {
    by_id: HashMap<TransactionId, &'a IndexedTransaction>,
    by_amount: HashMap<MinorUnits, BTreeSet<TransactionId>>,
    by_date: HashMap<EpochDay, BTreeSet<TransactionId>>,
    by_amount_date: HashMap<(MinorUnits, EpochDay), BTreeSet<TransactionId>>,
    /// Distinct amounts, ascending, for tolerance range scans.
    amount_keys: Vec<MinorUnits>,
    /// Distinct dates, ascending, for day-window scans.
    date_keys: Vec<EpochDay>,
}

impl<'a> TransactionIndexes<'a> {
    /// Index `txs` under `rule`'s comparison keys.
    ///
    /// Transactions without a comparison amount (foreign-currency rules on
    /// home-only lines) are reachable by ID and date but never by amount.
    pub fn build(txs: impl IntoIterator<Item = &'a IndexedTransaction>, rule: &MatchingRule) -> Self {
        let mut index = Self::default();
        for tx in txs {
            let date = tx.comparison_date(rule.date_field);
            index.by_id.insert(tx.id, tx);
            index.by_date.entry(date).or_default().insert(tx.id);
            if let Some(amount) = tx.comparison_amount(rule.compare_currency) {
                index.by_amount.entry(amount).or_default().insert(tx.id);
                index
                    .by_amount_date
                    .entry((amount, date))
                    .or_default()
                    .insert(tx.id);
            }
        }
        index.amount_keys = index.by_amount.keys().copied().collect();
        index.amount_keys.sort_unstable();
        index.date_keys = index.by_date.keys().copied().collect();
        index.date_keys.sort_unstable();
        index
    }

    #[must_use]
    pub fn get(&self, id: TransactionId) -> Option<&'a IndexedTransaction> {
        self.by_id.get(&id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// IDs whose comparison amount is exactly `amount`.
    pub fn ids_with_amount(&self, amount: MinorUnits) -> impl Iterator<Item = TransactionId> + '_ {
        self.by_amount.get(&amount).into_iter().flatten().copied()
    }

    /// IDs whose comparison date is exactly `date`.
    pub fn ids_on_date(&self, date: EpochDay) -> impl Iterator<Item = TransactionId> + '_ {
        self.by_date.get(&date).into_iter().flatten().copied()
    }

    /// IDs with exactly this amount on exactly this date.
    pub fn ids_with_amount_on_date(
        &self,
        amount: MinorUnits,
        date: EpochDay,
    ) -> impl Iterator<Item = TransactionId> + '_ {
        self.by_amount_date
            .get(&(amount, date))
            .into_iter()
            .flatten()
            .copied()
    }

    /// IDs whose amount lies in `low..=high`, ascending by amount then ID.
    ///
    /// Walks only the distinct amount buckets inside the range.
    pub fn ids_in_amount_range(
        &self,
        low: MinorUnits,
        high: MinorUnits,
    ) -> impl Iterator<Item = TransactionId> + '_ {
        let start = self.amount_keys.partition_point(|a| *a < low);
        let end = self.amount_keys.partition_point(|a| *a <= high);
        self.amount_keys[start..end.max(start)]
            .iter()
            .flat_map(move |amount| self.ids_with_amount(*amount))
    }

    /// IDs dated within `days` of `date` (inclusive), ascending by date then ID.
    ///
    /// Walks only the distinct dates inside the window, however wide.
    pub fn ids_near_date(&self, date: EpochDay, days: u32) -> impl Iterator<Item = TransactionId> + '_ {
        let days = i32::try_from(days).unwrap_or(i32::MAX);
        let low = EpochDay(date.0.saturating_sub(days));
        let high = EpochDay(date.0.saturating_add(days));
        let start = self.date_keys.partition_point(|d| *d < low);
        let end = self.date_keys.partition_point(|d| *d <= high);
        self.date_keys[start..end.max(start)]
            .iter()
            .flat_map(move |day| self.ids_on_date(*day))
    }
}
