//! Reconciliation engine: preview and commit over one unit.
//!
//! ```text
//! preview(unit) = load → seal → pipeline → summary            (no writes)
//! commit(unit)  = load → seal → pipeline → verify → claim → write (atomic)
//! ```
//!
//! The matching core never touches storage. Everything that can fail after
//! the pipeline ran (balance re-verification, claims, the bulk write) fails
//! the whole commit, and the store guarantees nothing partial is visible.

use chrono::Utc;
use tally_matchcore::{PipelineContext, PipelineOutcome, run_pipeline};
use tally_types::{
    Actor, EngineConfig, MatchGroup, MatchId, MatchingRule, PoolSnapshot, Result, RunSummary,
    TallyError, UnitId,
};

use crate::balance_check::BalanceCheck;
use crate::claims::ClaimLedger;
use crate::store::{MatchRecord, ReconStore};

/// Outcome of a successful commit.
#[derive(Debug, Clone)]
pub struct CommitReport {
    pub summary: RunSummary,
    /// Committed groups in commit order, for display.
    pub groups: Vec<MatchGroup>,
    /// IDs of the persisted match records, parallel to `groups`.
    pub match_ids: Vec<MatchId>,
}

/// Drives the pipeline against a [`ReconStore`].
pub struct ReconEngine<S> {
    store: S,
    config: EngineConfig,
}

impl<S: ReconStore> ReconEngine<S> {
    /// # Errors
    /// Returns `Configuration` if `config` has a zero cap.
    pub fn new(store: S, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every active rule and report what would match. Writes nothing.
    ///
    /// # Errors
    /// - `UnitNotFound` / `NoRules` from loading
    /// - ingestion errors from sealing the snapshot
    pub fn preview(&self, unit: UnitId) -> Result<RunSummary> {
        let (_, snapshot, outcome) = self.run(unit)?;
        let summary = summarize(&snapshot, &outcome);
        tracing::info!(
            unit = %unit,
            matches = summary.total_matches,
            transactions = summary.total_transactions,
            elapsed_ms = summary.elapsed_ms,
            "Preview finished"
        );
        Ok(summary)
    }

    /// Run every active rule and persist the result on behalf of `actor`.
    ///
    /// # Errors
    /// - everything [`preview`](Self::preview) returns
    /// - `BalanceViolation` / `MalformedCandidate` if a candidate fails
    ///   re-verification
    /// - `TransactionAlreadyMatched` if two records claim one transaction
    /// - `CommitFailed` or any store error from the bulk write
    pub fn commit(&mut self, unit: UnitId, actor: Actor) -> Result<CommitReport> {
        let (rules, snapshot, outcome) = self.run(unit)?;
        let summary = summarize(&snapshot, &outcome);
        let candidates = outcome.context.committed();

        BalanceCheck::new(&snapshot, &rules).verify_all(candidates)?;

        let matched_at = Utc::now();
        let mut ledger = ClaimLedger::new();
        let mut records = Vec::with_capacity(candidates.len());
        for (seq, candidate) in (0u64..).zip(candidates) {
            let id = MatchId::deterministic(&snapshot.snapshot_hash, seq);
            ledger.claim_all(candidate.all_ids(), id)?;
            records.push(MatchRecord {
                id,
                unit,
                rule_id: candidate.rule_id,
                set1_ids: candidate.set1_ids.clone(),
                set2_ids: candidate.set2_ids.clone(),
                score: candidate.score,
                difference: candidate.difference,
                actor: actor.clone(),
                matched_at,
            });
        }

        if !records.is_empty() {
            if let Err(e) = self.store.commit_matches(unit, &records) {
                tracing::error!(unit = %unit, records = records.len(), error = %e, "Commit failed");
                return Err(e);
            }
        }

        tracing::info!(
            unit = %unit,
            %actor,
            matches = records.len(),
            transactions = ledger.len(),
            match_root = %summary.match_root,
            "Matches committed"
        );

        let groups = candidates
            .iter()
            .map(|c| MatchGroup {
                set1_ids: c.set1_ids.clone(),
                set2_ids: c.set2_ids.clone(),
                rule_id: c.rule_id,
                score: c.score,
            })
            .collect();
        Ok(CommitReport {
            summary,
            groups,
            match_ids: records.iter().map(|r| r.id).collect(),
        })
    }

    fn run(&self, unit: UnitId) -> Result<(Vec<MatchingRule>, PoolSnapshot, PipelineOutcome)> {
        let rules = self.store.load_rules(unit)?;
        if rules.is_empty() {
            return Err(TallyError::NoRules(unit));
        }
        let snapshot = self.store.load_unmatched(unit)?;
        tracing::debug!(
            unit = %unit,
            set1 = snapshot.set1.len(),
            set2 = snapshot.set2.len(),
            snapshot = %snapshot.hash_hex(),
            "Snapshot loaded"
        );
        let outcome = run_pipeline(
            PipelineContext::from_snapshot(&snapshot),
            &rules,
            &self.config,
        );
        Ok((rules, snapshot, outcome))
    }
}

fn summarize(snapshot: &PoolSnapshot, outcome: &PipelineOutcome) -> RunSummary {
    RunSummary {
        total_matches: outcome.total_matches(),
        total_transactions: outcome.total_transactions(),
        rules: outcome.rule_stats.clone(),
        elapsed_ms: outcome.elapsed_ms,
        snapshot_hash: snapshot.hash_hex(),
        match_root: hex::encode(outcome.match_root),
    }
}
