//! One-to-one matching, across sides and within one side.

use tally_types::{
    IndexedTransaction, MatchCandidate, MatchingRule, MinorUnits, RuleStrategy, Side,
    TransactionId,
};

use super::{HandlerOutput, build_candidate};
use crate::{
    PipelineContext, index::TransactionIndexes, matchers::pair_matches, search::SearchLimits,
    selector::select_non_overlapping,
};

/// Pair every Set-1 transaction with Set-2 transactions that negate it.
pub(super) fn cross_side(
    rule: &MatchingRule,
    ctx: &PipelineContext,
    limits: &SearchLimits,
) -> HandlerOutput {
    let index = TransactionIndexes::build(ctx.pool(Side::Set2).values(), rule);
    let mut raw = Vec::new();
    for anchor in ctx.pool(Side::Set1).values() {
        let mut proposed = 0;
        for partner_id in partner_ids(anchor, &index, rule) {
            let Some(partner) = index.get(partner_id) else {
                continue;
            };
            if let Some(candidate) = pair(rule, RuleStrategy::OneToOne, anchor, partner) {
                raw.push(candidate);
                proposed += 1;
                if proposed >= limits.max_candidates_per_anchor {
                    break;
                }
            }
        }
    }

    tracing::debug!(rule = %rule.id, raw = raw.len(), "one-to-one candidates");
    HandlerOutput {
        accepted: select_non_overlapping(raw),
        truncated_searches: 0,
    }
}

/// Pair transactions within each side, independently per side.
///
/// Each unordered pair is proposed once, with the lower ID as the anchor.
pub(super) fn internal(
    rule: &MatchingRule,
    ctx: &PipelineContext,
    limits: &SearchLimits,
) -> HandlerOutput {
    let mut accepted = Vec::new();
    for side in Side::BOTH {
        let pool = ctx.pool(side);
        let index = TransactionIndexes::build(pool.values(), rule);
        let mut raw = Vec::new();
        for anchor in pool.values() {
            let mut proposed = 0;
            for partner_id in partner_ids(anchor, &index, rule) {
                if partner_id <= anchor.id {
                    continue;
                }
                let Some(partner) = index.get(partner_id) else {
                    continue;
                };
                if let Some(candidate) = pair(rule, RuleStrategy::InternalOneToOne, anchor, partner)
                {
                    raw.push(candidate);
                    proposed += 1;
                    if proposed >= limits.max_candidates_per_anchor {
                        break;
                    }
                }
            }
        }
        tracing::debug!(rule = %rule.id, %side, raw = raw.len(), "internal one-to-one candidates");
        accepted.extend(select_non_overlapping(raw));
    }
    HandlerOutput {
        accepted,
        truncated_searches: 0,
    }
}

/// Partner IDs whose amount can negate the anchor's within tolerance.
///
/// Exact rules hit the hash index directly (the amount+date index when the
/// date must match exactly); tolerant rules scan the amount buckets in
/// `[-a - tol, -a + tol]`.
fn partner_ids(
    anchor: &IndexedTransaction,
    index: &TransactionIndexes<'_>,
    rule: &MatchingRule,
) -> Vec<TransactionId> {
    let Some(amount) = anchor.comparison_amount(rule.compare_currency) else {
        return Vec::new();
    };
    let target = -amount;
    let tolerance = rule.effective_tolerance();
    if tolerance == MinorUnits::ZERO {
        if rule.date_must_match && rule.date_tolerance_days == 0 {
            let date = anchor.comparison_date(rule.date_field);
            index.ids_with_amount_on_date(target, date).collect()
        } else {
            index.ids_with_amount(target).collect()
        }
    } else {
        index
            .ids_in_amount_range(target - tolerance, target + tolerance)
            .collect()
    }
}

fn pair(
    rule: &MatchingRule,
    strategy: RuleStrategy,
    first: &IndexedTransaction,
    second: &IndexedTransaction,
) -> Option<MatchCandidate> {
    if !pair_matches(first, second, rule) {
        return None;
    }
    build_candidate(rule, strategy, &[first], &[second])
}
