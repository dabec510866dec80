//! # tally-ingress
//!
//! **Ingestion boundary**: the one place where stored rows become the
//! fixed-point, epoch-day form the matching core works on.
//!
//! ## Architecture
//!
//! 1. **normalize**: `RawTransaction` (decimal amounts, calendar dates) →
//!    `IndexedTransaction` (`MinorUnits`, `EpochDay`), exactly once
//! 2. **SnapshotBuilder**: collects normalized transactions, rejecting
//!    duplicates, then seals them into an ID-sorted, hashed `PoolSnapshot`
//!
//! ```text
//! storage rows → normalize() → SnapshotBuilder.push() → seal() → PoolSnapshot → MatchCore
//! ```

pub mod normalize;
pub mod snapshot;

pub use normalize::{RawTransaction, normalize};
pub use snapshot::{SnapshotBuilder, verify_snapshot_hash};
