//! Error types for the Tally matching engine.
//!
//! All errors use the `TL_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Input / normalization errors
//! - 2xx: Rule configuration errors
//! - 3xx: Matching errors
//! - 4xx: Commit / storage errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{RuleId, TransactionId, UnitId};

/// Central error enum for all Tally operations.
#[derive(Debug, Error)]
pub enum TallyError {
    // =================================================================
    // Input Errors (1xx)
    // =================================================================
    /// An amount cannot be represented in `i64` minor units.
    #[error("TL_ERR_100: Amount out of range: {amount}")]
    AmountOutOfRange { amount: String },

    /// A transaction carried more dimension tags than the model allows.
    #[error("TL_ERR_101: Too many dimensions on {id}: {count} (max {max})")]
    TooManyDimensions {
        id: TransactionId,
        count: usize,
        max: usize,
    },

    /// The same transaction ID appeared twice in one snapshot.
    #[error("TL_ERR_102: Duplicate transaction in snapshot: {0}")]
    DuplicateTransaction(TransactionId),

    /// A transaction row failed validation.
    #[error("TL_ERR_103: Invalid transaction {id}: {reason}")]
    InvalidTransaction { id: TransactionId, reason: String },

    // =================================================================
    // Rule Errors (2xx)
    // =================================================================
    /// The rule configuration is not usable.
    #[error("TL_ERR_200: Invalid rule {rule_id}: {reason}")]
    InvalidRule { rule_id: RuleId, reason: String },

    /// No rules exist for the reconciliation unit.
    #[error("TL_ERR_201: No rules configured for unit {0}")]
    NoRules(UnitId),

    // =================================================================
    // Matching Errors (3xx)
    // =================================================================
    /// A proposed candidate references fewer than two transactions.
    #[error("TL_ERR_300: Malformed candidate from rule {rule_id}: {reason}")]
    MalformedCandidate { rule_id: RuleId, reason: String },

    /// A candidate's amounts do not cancel within its rule's tolerance.
    #[error("TL_ERR_301: Balance violation in rule {rule_id}: residual {residual} exceeds tolerance {tolerance}")]
    BalanceViolation {
        rule_id: RuleId,
        residual: i64,
        tolerance: i64,
    },

    /// Two runs over the same snapshot produced different results.
    #[error("TL_ERR_302: Determinism violation: expected {expected}, got {actual}")]
    DeterminismViolation { expected: String, actual: String },

    // =================================================================
    // Commit Errors (4xx)
    // =================================================================
    /// The bulk write failed; nothing was committed.
    #[error("TL_ERR_400: Commit failed: {reason}")]
    CommitFailed { reason: String },

    /// A transaction is already matched (in storage or earlier in the batch).
    #[error("TL_ERR_401: Transaction already matched: {0}")]
    TransactionAlreadyMatched(TransactionId),

    /// A referenced transaction does not exist in storage.
    #[error("TL_ERR_402: Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// The reconciliation unit does not exist in storage.
    #[error("TL_ERR_403: Reconciliation unit not found: {0}")]
    UnitNotFound(UnitId),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("TL_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("TL_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config document, zero caps, etc.).
    #[error("TL_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, TallyError>;

impl From<serde_json::Error> for TallyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
