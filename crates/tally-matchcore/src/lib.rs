//! # tally-matchcore
//!
//! **Pure synchronous matching core for Tally.**
//!
//! MatchCore is the compute plane: it takes a sealed [`PoolSnapshot`] and
//! an ordered rule set and proposes matches. It has:
//!
//! - **Zero side effects**: no storage access, no clocks beyond timing logs
//! - **Deterministic output**: same snapshot + rules → same candidates and scores
//! - **At most one match per transaction per run**: only the pipeline
//!   driver removes matched IDs from the pools
//! - **Bounded search**: iteration caps, group-size caps and a pool-size
//!   ceiling for the combinatorial rule types
//!
//! ```text
//! run_pipeline(PipelineContext, rules, config) -> PipelineOutcome
//! ```
//!
//! [`PoolSnapshot`]: tally_types::PoolSnapshot

pub mod context;
pub mod determinism;
pub mod handlers;
pub mod index;
pub mod matchers;
pub mod pipeline;
pub mod scorer;
pub mod search;
pub mod selector;

pub use context::PipelineContext;
pub use determinism::{compute_match_root, verify_match_root};
pub use handlers::run_strategy;
pub use index::TransactionIndexes;
pub use pipeline::{PipelineOutcome, run_pipeline};
pub use scorer::{score_group, score_pair};
pub use search::{SearchBudget, SearchLimits};
pub use selector::select_non_overlapping;
