//! # tally-types
//!
//! Shared types, errors, and configuration for the **Tally** matching engine.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`TransactionId`], [`RuleId`], [`MatchId`], [`UnitId`], [`Actor`]
//! - **Fixed-point values**: [`MinorUnits`] (øre), [`EpochDay`]
//! - **Transaction model**: [`IndexedTransaction`], [`Side`], [`TransactionField`]
//! - **Rule model**: [`MatchingRule`], [`RuleType`], [`RuleStrategy`], [`FieldCondition`]
//! - **Candidate model**: [`MatchCandidate`]
//! - **Run input**: [`PoolSnapshot`]
//! - **Run statistics**: [`RuleStats`], [`RunSummary`], [`SkipReason`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`TallyError`] with `TL_ERR_` prefix codes
//! - **Constants**: engine-wide limits and defaults

pub mod candidate;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod money;
pub mod rule;
pub mod snapshot;
pub mod stats;
pub mod transaction;

// Re-export all primary types at crate root for ergonomic imports:
//   use tally_types::{IndexedTransaction, MatchingRule, MinorUnits, ...};

pub use candidate::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use money::*;
pub use rule::*;
pub use snapshot::*;
pub use stats::*;
pub use transaction::*;

// Constants are accessed via `tally_types::constants::FOO`
// (not re-exported to avoid name collisions).
