//! # tally-engine
//!
//! **Commit boundary** for the Tally matching engine.
//!
//! ## Architecture
//!
//! The engine loads one reconciliation unit from a [`ReconStore`], runs the
//! MatchCore pipeline over it, and either:
//! - **previews**: returns aggregate statistics, persisting nothing, or
//! - **commits**: verifies every candidate, then writes one match record
//!   per candidate and flips every referenced transaction to matched, as a
//!   single all-or-nothing unit of work.
//!
//! Before anything is written, each candidate is re-checked against the
//! snapshot:
//! 1. Claim ledger: no transaction in two records
//! 2. Balance check: residual recomputed and within the rule's tolerance
//!
//! Every record is attributed to the [`Actor`](tally_types::Actor) that
//! started the commit.

pub mod balance_check;
pub mod claims;
pub mod engine;
pub mod store;

pub use balance_check::BalanceCheck;
pub use claims::ClaimLedger;
pub use engine::{CommitReport, ReconEngine};
pub use store::{InMemoryStore, MatchRecord, MatchStatus, ReconStore, StoredTransaction};
