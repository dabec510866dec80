//! Matching rule configuration.
//!
//! Rules are user-authored and loaded from storage. A rule's type and
//! internal flag together pick one of five [`RuleStrategy`] variants; the
//! pipeline dispatches on that enum once per rule.

use serde::{Deserialize, Serialize};

use crate::{MinorUnits, Result, RuleId, TallyError, TransactionField, constants};

/// Shape of the groups a rule looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    OneToOne,
    ManyToOne,
    ManyToMany,
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneToOne => write!(f, "ONE_TO_ONE"),
            Self::ManyToOne => write!(f, "MANY_TO_ONE"),
            Self::ManyToMany => write!(f, "MANY_TO_MANY"),
        }
    }
}

/// The concrete algorithm a rule runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStrategy {
    OneToOne,
    ManyToOne,
    ManyToMany,
    InternalOneToOne,
    InternalManyToOne,
}

impl RuleStrategy {
    /// Subset-search strategies, subject to the pool-size ceiling.
    #[must_use]
    pub fn is_expensive(self) -> bool {
        matches!(
            self,
            Self::ManyToOne | Self::ManyToMany | Self::InternalManyToOne
        )
    }

    #[must_use]
    pub fn is_internal(self) -> bool {
        matches!(self, Self::InternalOneToOne | Self::InternalManyToOne)
    }
}

impl std::fmt::Display for RuleStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneToOne => write!(f, "ONE_TO_ONE"),
            Self::ManyToOne => write!(f, "MANY_TO_ONE"),
            Self::ManyToMany => write!(f, "MANY_TO_MANY"),
            Self::InternalOneToOne => write!(f, "INTERNAL_ONE_TO_ONE"),
            Self::InternalManyToOne => write!(f, "INTERNAL_MANY_TO_ONE"),
        }
    }
}

/// Which amount field the amount matcher compares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareCurrency {
    #[default]
    Home,
    Foreign,
}

/// Which date field the date matcher compares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    #[default]
    Primary,
    /// Secondary date, falling back to the primary date when absent.
    Secondary,
}

/// String comparison applied by a field condition. Always case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    Contains,
    StartsWith,
}

/// Which transaction of a pair a condition reads its field from.
///
/// For cross-side rules `First` is the Set-1 transaction; for internal
/// rules it is the anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionSubject {
    #[default]
    First,
    Second,
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ConditionValue {
    /// Compare against a fixed string.
    Literal(String),
    /// Compare against a (same or different) field on the other transaction.
    OtherField(TransactionField),
}

/// One entry of a rule's AND-combined condition list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldCondition {
    #[serde(default)]
    pub subject: ConditionSubject,
    pub field: TransactionField,
    pub operator: ConditionOperator,
    pub value: ConditionValue,
}

/// A user-defined matching rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingRule {
    pub id: RuleId,
    pub name: String,
    /// Lower runs first.
    pub priority: i32,
    pub active: bool,
    pub rule_type: RuleType,
    /// Match within one side instead of across sides.
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub date_must_match: bool,
    #[serde(default)]
    pub date_tolerance_days: u32,
    #[serde(default)]
    pub date_field: DateField,
    #[serde(default)]
    pub compare_currency: CompareCurrency,
    #[serde(default)]
    pub allow_tolerance: bool,
    /// Maximum absolute residual, honoured only when `allow_tolerance`.
    #[serde(default)]
    pub tolerance: MinorUnits,
    #[serde(default)]
    pub conditions: Vec<FieldCondition>,
}

impl MatchingRule {
    /// The amount tolerance actually applied: zero unless tolerance is allowed.
    #[must_use]
    pub fn effective_tolerance(&self) -> MinorUnits {
        if self.allow_tolerance {
            self.tolerance
        } else {
            MinorUnits::ZERO
        }
    }

    /// Map rule type × internal flag onto the algorithm to run.
    pub fn strategy(&self) -> Result<RuleStrategy> {
        match (self.rule_type, self.internal) {
            (RuleType::OneToOne, false) => Ok(RuleStrategy::OneToOne),
            (RuleType::ManyToOne, false) => Ok(RuleStrategy::ManyToOne),
            (RuleType::ManyToMany, false) => Ok(RuleStrategy::ManyToMany),
            (RuleType::OneToOne, true) => Ok(RuleStrategy::InternalOneToOne),
            (RuleType::ManyToOne, true) => Ok(RuleStrategy::InternalManyToOne),
            (RuleType::ManyToMany, true) => Err(TallyError::InvalidRule {
                rule_id: self.id,
                reason: "internal many-to-many is not supported".into(),
            }),
        }
    }

    /// Check the rule is runnable. Returns the strategy on success.
    pub fn validate(&self) -> Result<RuleStrategy> {
        let strategy = self.strategy()?;
        if self.allow_tolerance && self.tolerance.is_negative() {
            return Err(TallyError::InvalidRule {
                rule_id: self.id,
                reason: format!("negative amount tolerance {}", self.tolerance),
            });
        }
        for condition in &self.conditions {
            let fields = [
                Some(condition.field),
                match condition.value {
                    ConditionValue::OtherField(field) => Some(field),
                    ConditionValue::Literal(_) => None,
                },
            ];
            for field in fields.into_iter().flatten() {
                let TransactionField::Dimension(slot) = field else {
                    continue;
                };
                if usize::from(slot) >= constants::MAX_DIMENSIONS {
                    return Err(TallyError::InvalidRule {
                        rule_id: self.id,
                        reason: format!("dimension slot {slot} out of range"),
                    });
                }
            }
        }
        Ok(strategy)
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl MatchingRule {
    /// Active rule with exact amounts and no date or field requirements.
    pub fn dummy(id: u128, priority: i32, rule_type: RuleType) -> Self {
        Self {
            id: RuleId::from_u128(id),
            name: format!("rule-{id}"),
            priority,
            active: true,
            rule_type,
            internal: false,
            date_must_match: false,
            date_tolerance_days: 0,
            date_field: DateField::Primary,
            compare_currency: CompareCurrency::Home,
            allow_tolerance: false,
            tolerance: MinorUnits::ZERO,
            conditions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: i64) -> Self {
        self.allow_tolerance = true;
        self.tolerance = MinorUnits(tolerance);
        self
    }

    #[must_use]
    pub fn with_dates(mut self, tolerance_days: u32) -> Self {
        self.date_must_match = true;
        self.date_tolerance_days = tolerance_days;
        self
    }

    #[must_use]
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_dispatch_table() {
        let r = MatchingRule::dummy(1, 1, RuleType::OneToOne);
        assert_eq!(r.strategy().unwrap(), RuleStrategy::OneToOne);
        let r = MatchingRule::dummy(1, 1, RuleType::ManyToOne).internal();
        assert_eq!(r.strategy().unwrap(), RuleStrategy::InternalManyToOne);
        let r = MatchingRule::dummy(1, 1, RuleType::ManyToMany).internal();
        assert!(matches!(r.strategy(), Err(TallyError::InvalidRule { .. })));
    }

    #[test]
    fn tolerance_ignored_unless_allowed() {
        let mut r = MatchingRule::dummy(1, 1, RuleType::OneToOne);
        r.tolerance = MinorUnits(50);
        assert_eq!(r.effective_tolerance(), MinorUnits::ZERO);
        let r = r.with_tolerance(50);
        assert_eq!(r.effective_tolerance(), MinorUnits(50));
    }

    #[test]
    fn validate_rejects_bad_dimension_slot() {
        let mut r = MatchingRule::dummy(1, 1, RuleType::OneToOne);
        r.conditions.push(FieldCondition {
            subject: ConditionSubject::First,
            field: TransactionField::Reference,
            operator: ConditionOperator::Equals,
            value: ConditionValue::OtherField(TransactionField::Dimension(12)),
        });
        assert!(r.validate().is_err());
    }

    #[test]
    fn validate_rejects_negative_tolerance() {
        let r = MatchingRule::dummy(1, 1, RuleType::ManyToOne).with_tolerance(-1);
        assert!(r.validate().is_err());
    }

    #[test]
    fn expensive_strategies() {
        assert!(!RuleStrategy::OneToOne.is_expensive());
        assert!(!RuleStrategy::InternalOneToOne.is_expensive());
        assert!(RuleStrategy::ManyToOne.is_expensive());
        assert!(RuleStrategy::ManyToMany.is_expensive());
        assert!(RuleStrategy::InternalManyToOne.is_expensive());
    }

    #[test]
    fn rule_deserializes_with_defaults() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-000000000007",
            "name": "bank fees",
            "priority": 3,
            "active": true,
            "rule_type": "many_to_one",
            "conditions": [
                {"field": {"field": "reference"}, "operator": "contains",
                 "value": {"kind": "literal", "value": "fee"}}
            ]
        }"#;
        let rule: MatchingRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.rule_type, RuleType::ManyToOne);
        assert!(!rule.internal);
        assert_eq!(rule.effective_tolerance(), MinorUnits::ZERO);
        assert_eq!(rule.conditions[0].subject, ConditionSubject::First);
    }
}
