//! Predicates shared by every handler: amount, date and field conditions.
//!
//! All pure functions. Amounts are fixed-point, so "matches" is exact
//! integer comparison against the rule's effective tolerance.

use tally_types::{
    ConditionOperator, ConditionSubject, ConditionValue, FieldCondition, IndexedTransaction,
    MatchingRule, MinorUnits,
};

/// Residual of a set of amounts: `|Σ amounts|`. Balanced groups are zero.
#[must_use]
pub fn residual(amounts: impl IntoIterator<Item = MinorUnits>) -> MinorUnits {
    amounts.into_iter().sum::<MinorUnits>().abs()
}

/// Residual of two opposing amounts: `|a + b|`.
#[must_use]
pub fn amount_difference(a: MinorUnits, b: MinorUnits) -> MinorUnits {
    (a + b).abs()
}

/// Whether the comparison amounts of `a` and `b` cancel within tolerance.
///
/// Fails when either transaction lacks the compared amount.
#[must_use]
pub fn amounts_match(a: &IndexedTransaction, b: &IndexedTransaction, rule: &MatchingRule) -> bool {
    let (Some(x), Some(y)) = (
        a.comparison_amount(rule.compare_currency),
        b.comparison_amount(rule.compare_currency),
    ) else {
        return false;
    };
    amount_difference(x, y) <= rule.effective_tolerance()
}

/// Days between the rule's comparison dates of `a` and `b`.
#[must_use]
pub fn day_difference(a: &IndexedTransaction, b: &IndexedTransaction, rule: &MatchingRule) -> u32 {
    a.comparison_date(rule.date_field)
        .abs_diff(b.comparison_date(rule.date_field))
}

/// Always true unless the rule requires dates to match, in which case the
/// dates may differ by at most `date_tolerance_days`.
#[must_use]
pub fn dates_match(a: &IndexedTransaction, b: &IndexedTransaction, rule: &MatchingRule) -> bool {
    !rule.date_must_match || day_difference(a, b, rule) <= rule.date_tolerance_days
}

/// AND of every condition. An empty list always passes.
///
/// `first` is the Set-1 transaction for cross-side rules and the anchor for
/// internal rules.
#[must_use]
pub fn conditions_match(
    first: &IndexedTransaction,
    second: &IndexedTransaction,
    conditions: &[FieldCondition],
) -> bool {
    conditions
        .iter()
        .all(|c| condition_matches(first, second, c))
}

fn condition_matches(
    first: &IndexedTransaction,
    second: &IndexedTransaction,
    condition: &FieldCondition,
) -> bool {
    let (subject, other) = match condition.subject {
        ConditionSubject::First => (first, second),
        ConditionSubject::Second => (second, first),
    };
    let Some(left) = subject.field(condition.field) else {
        return false;
    };
    let right = match &condition.value {
        ConditionValue::Literal(text) => Some(text.as_str()),
        ConditionValue::OtherField(field) => other.field(*field),
    };
    let Some(right) = right else {
        return false;
    };

    let left = left.to_lowercase();
    let right = right.to_lowercase();
    match condition.operator {
        ConditionOperator::Equals => left == right,
        ConditionOperator::Contains => left.contains(&right),
        ConditionOperator::StartsWith => left.starts_with(&right),
    }
}

/// Full pair check used by the one-to-one handlers.
#[must_use]
pub fn pair_matches(
    first: &IndexedTransaction,
    second: &IndexedTransaction,
    rule: &MatchingRule,
) -> bool {
    amounts_match(first, second, rule)
        && dates_match(first, second, rule)
        && conditions_match(first, second, &rule.conditions)
}
