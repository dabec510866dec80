//! Confidence scoring for candidates.
//!
//! | Component   | Weight | Rule                                              |
//! |-------------|--------|---------------------------------------------------|
//! | amount      | 40     | linear from 0 residual to the tolerance ceiling   |
//! | date        | 30     | mean over cross pairs, linear across the window   |
//! | reference   | 15     | best cross pair: equal 1, containment ½           |
//! | description | 10     | same as reference                                 |
//! | count       | 5      | full for two transactions, `2/n` beyond           |
//!
//! Scores are comparable only within one pipeline run.

use tally_types::{IndexedTransaction, MatchingRule, MinorUnits, constants};

use crate::matchers::day_difference;

/// Score a single pair with a known residual.
#[must_use]
pub fn score_pair(
    a: &IndexedTransaction,
    b: &IndexedTransaction,
    difference: MinorUnits,
    rule: &MatchingRule,
) -> u8 {
    score_group(&[a], &[b], difference, rule)
}

/// Score a group given its two sides (Set 1 / Set 2 or anchor / partners).
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn score_group(
    left: &[&IndexedTransaction],
    right: &[&IndexedTransaction],
    difference: MinorUnits,
    rule: &MatchingRule,
) -> u8 {
    let total = constants::SCORE_WEIGHT_AMOUNT * amount_component(difference, rule.effective_tolerance())
        + constants::SCORE_WEIGHT_DATE * date_component(left, right, rule)
        + constants::SCORE_WEIGHT_REFERENCE
            * best_text_similarity(left, right, |tx| tx.reference.as_deref())
        + constants::SCORE_WEIGHT_DESCRIPTION
            * best_text_similarity(left, right, |tx| tx.description.as_deref())
        + constants::SCORE_WEIGHT_COUNT * count_component(left.len() + right.len());

    total.round().clamp(0.0, f64::from(constants::MAX_SCORE)) as u8
}

fn amount_component(difference: MinorUnits, tolerance: MinorUnits) -> f64 {
    let diff = difference.abs().0;
    if diff == 0 {
        return 1.0;
    }
    if tolerance.0 <= 0 {
        return 0.0;
    }
    (1.0 - diff as f64 / tolerance.0 as f64).max(0.0)
}

/// Mean proximity over every cross pair. Without a day window any gap
/// scores zero.
fn date_component(
    left: &[&IndexedTransaction],
    right: &[&IndexedTransaction],
    rule: &MatchingRule,
) -> f64 {
    let window = f64::from(rule.date_tolerance_days);
    let mut sum = 0.0;
    let mut pairs = 0u32;
    for a in left {
        for b in right {
            let days = day_difference(a, b, rule);
            sum += if days == 0 {
                1.0
            } else if rule.date_tolerance_days == 0 {
                0.0
            } else {
                (1.0 - f64::from(days) / window).max(0.0)
            };
            pairs += 1;
        }
    }
    if pairs == 0 { 0.0 } else { sum / f64::from(pairs) }
}

fn best_text_similarity<'t>(
    left: &[&'t IndexedTransaction],
    right: &[&'t IndexedTransaction],
    field: impl Fn(&'t IndexedTransaction) -> Option<&'t str>,
) -> f64 {
    let mut best: f64 = 0.0;
    for a in left {
        for b in right {
            best = best.max(text_similarity(field(a), field(b)));
            if best >= 1.0 {
                return best;
            }
        }
    }
    best
}

/// Both absent counts as agreement; one absent as none.
fn text_similarity(a: Option<&str>, b: Option<&str>) -> f64 {
    match (a, b) {
        (None, None) => 1.0,
        (Some(a), Some(b)) => {
            let a = a.trim().to_lowercase();
            let b = b.trim().to_lowercase();
            if a == b {
                1.0
            } else if !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a)) {
                0.5
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn count_component(transactions: usize) -> f64 {
    if transactions <= 2 {
        1.0
    } else {
        2.0 / transactions as f64
    }
}

#[cfg(test)]
mod tests {
    use tally_types::{RuleType, Side};

    use super::*;

    fn tx(id: u128, side: Side, amount: i64, date: i32) -> IndexedTransaction {
        IndexedTransaction::dummy(id, side, amount, date)
    }

    #[test]
    fn perfect_pair_scores_100() {
        let rule = MatchingRule::dummy(1, 1, RuleType::OneToOne).with_dates(0);
        let a = tx(1, Side::Set1, 10000, 19000);
        let b = tx(2, Side::Set2, -10000, 19000);
        assert_eq!(score_pair(&a, &b, MinorUnits::ZERO, &rule), 100);
    }

    #[test]
    fn amount_decays_to_tolerance() {
        let rule = MatchingRule::dummy(1, 1, RuleType::OneToOne).with_tolerance(100);
        let a = tx(1, Side::Set1, 10000, 19000);
        let b = tx(2, Side::Set2, -9950, 19000);
        // half the amount weight lost
        assert_eq!(score_pair(&a, &b, MinorUnits(50), &rule), 80);
        assert_eq!(score_pair(&a, &b, MinorUnits(100), &rule), 60);
    }

    #[test]
    fn date_decays_across_window() {
        let rule = MatchingRule::dummy(1, 1, RuleType::OneToOne).with_dates(4);
        let a = tx(1, Side::Set1, 1, 19000);
        let b = tx(2, Side::Set2, -1, 19002);
        assert_eq!(score_pair(&a, &b, MinorUnits::ZERO, &rule), 85);
        let no_window = MatchingRule::dummy(1, 1, RuleType::OneToOne);
        assert_eq!(score_pair(&a, &b, MinorUnits::ZERO, &no_window), 70);
    }

    #[test]
    fn reference_containment_is_half() {
        let rule = MatchingRule::dummy(1, 1, RuleType::OneToOne);
        let a = tx(1, Side::Set1, 1, 0).with_reference("INV-42");
        let b = tx(2, Side::Set2, -1, 0).with_reference("payment inv-42");
        // 40 + 30 + 7.5 + 10 + 5 = 92.5, rounds up
        assert_eq!(score_pair(&a, &b, MinorUnits::ZERO, &rule), 93);
        let c = tx(3, Side::Set2, -1, 0);
        assert_eq!(score_pair(&a, &c, MinorUnits::ZERO, &rule), 85);
    }

    #[test]
    fn group_uses_best_text_and_count_bonus() {
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToOne);
        let anchor = tx(1, Side::Set1, -15000, 0).with_reference("A");
        let p1 = tx(2, Side::Set2, 5000, 0);
        let p2 = tx(3, Side::Set2, 10000, 0).with_reference("a");
        // count bonus 5 * 2/3
        let score = score_group(&[&anchor], &[&p1, &p2], MinorUnits::ZERO, &rule);
        assert_eq!(score, 98);
    }

    #[test]
    fn score_never_exceeds_max() {
        let rule = MatchingRule::dummy(1, 1, RuleType::OneToOne);
        let a = tx(1, Side::Set1, 1, 0);
        let b = tx(2, Side::Set2, -1, 0);
        assert!(score_pair(&a, &b, MinorUnits(-0), &rule) <= constants::MAX_SCORE);
    }
}
