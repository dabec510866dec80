//! Identifiers used throughout Tally.
//!
//! Entity IDs minted by the engine use UUIDv7 for time-ordered sorting.
//! IDs handed in by storage are wrapped as-is; their `Ord` is the tie-break
//! order for every deterministic walk in the core.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// TransactionId
// ---------------------------------------------------------------------------

/// Identifier of one imported transaction (ledger line or bank line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RuleId
// ---------------------------------------------------------------------------

/// Identifier of a matching rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RuleId(pub Uuid);

impl RuleId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// UnitId
// ---------------------------------------------------------------------------

/// Identifier of a reconciliation unit (one Set 1 / Set 2 pairing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct UnitId(pub Uuid);

impl UnitId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MatchId
// ---------------------------------------------------------------------------

/// Identifier of a committed match record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MatchId(pub Uuid);

impl MatchId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Deterministic `MatchId` from the snapshot hash and candidate sequence.
    ///
    /// Running the same rules over the same snapshot yields the same IDs,
    /// so a retried commit can be recognised.
    #[must_use]
    pub fn deterministic(snapshot_hash: &[u8; 32], sequence: u64) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"tally:match_id:v1:");
        hasher.update(snapshot_hash);
        hasher.update(sequence.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash[..16]);
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for MatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "match:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Who initiated a commit. Every match record is attributed to one actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Actor {
    /// A signed-in user.
    User(Uuid),
    /// An automated agent (scheduler, assistant), identified by name.
    Agent(String),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Agent(name) => write!(f, "agent:{name}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_id_uniqueness() {
        let a = TransactionId::new();
        let b = TransactionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn from_u128_orders_numerically() {
        assert!(TransactionId::from_u128(1) < TransactionId::from_u128(2));
        assert!(RuleId::from_u128(9) < RuleId::from_u128(10));
    }

    #[test]
    fn match_id_deterministic() {
        let hash = [7u8; 32];
        let a = MatchId::deterministic(&hash, 0);
        let b = MatchId::deterministic(&hash, 0);
        assert_eq!(a, b);
        assert_ne!(a, MatchId::deterministic(&hash, 1));
        assert_ne!(a, MatchId::deterministic(&[8u8; 32], 0));
    }

    #[test]
    fn display_prefixes() {
        assert!(TransactionId::from_u128(1).to_string().starts_with("tx:"));
        assert!(UnitId::from_u128(1).to_string().starts_with("unit:"));
        assert_eq!(Actor::Agent("scheduler".into()).to_string(), "agent:scheduler");
    }

    #[test]
    fn actor_serde_roundtrip() {
        let actor = Actor::User(Uuid::from_u128(42));
        let json = serde_json::to_string(&actor).unwrap();
        assert!(json.contains("\"kind\":\"user\""));
        let back: Actor = serde_json::from_str(&json).unwrap();
        assert_eq!(actor, back);
    }
}
