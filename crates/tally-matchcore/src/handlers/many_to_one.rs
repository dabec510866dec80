//! Many-to-one matching: one anchor against a group from the other side
//! (or, for internal rules, from the same side).
//!
//! Per anchor:
//! 1. Gather partners that could cancel it: opposite sign, magnitude at
//!    most `|anchor| + tolerance`, dates and conditions satisfied.
//! 2. Order them by date proximity, then ID, and keep the first
//!    `max_candidates_per_anchor`.
//! 3. Search for the subset of at least two partners whose sum is closest
//!    to `-anchor` within tolerance.

use tally_types::{
    IndexedTransaction, MatchCandidate, MatchingRule, MinorUnits, RuleStrategy, Side,
    TransactionId,
};

use super::{HandlerOutput, build_candidate, condition_order};
use crate::{
    PipelineContext,
    index::TransactionIndexes,
    matchers::{conditions_match, dates_match, day_difference},
    search::{SearchLimits, SubsetQuery, find_subset},
    selector::select_non_overlapping,
};

/// Each side in turn anchors against groups from the other side.
pub(super) fn cross_side(
    rule: &MatchingRule,
    ctx: &PipelineContext,
    limits: &SearchLimits,
) -> HandlerOutput {
    let mut raw = Vec::new();
    let mut truncated_searches = 0;
    'sides: for anchor_side in Side::BOTH {
        let index = TransactionIndexes::build(ctx.pool(anchor_side.other()).values(), rule);
        for anchor in ctx.pool(anchor_side).values() {
            if limits.deadline_passed() {
                tracing::warn!(rule = %rule.id, "rule deadline passed, stopping anchor scan");
                truncated_searches += 1;
                break 'sides;
            }
            let proposal = propose(rule, RuleStrategy::ManyToOne, anchor, &index, limits);
            truncated_searches += usize::from(proposal.truncated);
            raw.extend(proposal.candidate);
        }
    }

    tracing::debug!(rule = %rule.id, raw = raw.len(), truncated_searches, "many-to-one candidates");
    HandlerOutput {
        accepted: select_non_overlapping(raw),
        truncated_searches,
    }
}

/// Anchors and groups drawn from the same side, once per side.
pub(super) fn internal(
    rule: &MatchingRule,
    ctx: &PipelineContext,
    limits: &SearchLimits,
) -> HandlerOutput {
    let mut accepted = Vec::new();
    let mut truncated_searches = 0;
    for side in Side::BOTH {
        let pool = ctx.pool(side);
        let index = TransactionIndexes::build(pool.values(), rule);
        let mut raw = Vec::new();
        for anchor in pool.values() {
            if limits.deadline_passed() {
                truncated_searches += 1;
                break;
            }
            let proposal = propose(rule, RuleStrategy::InternalManyToOne, anchor, &index, limits);
            truncated_searches += usize::from(proposal.truncated);
            raw.extend(proposal.candidate);
        }
        tracing::debug!(rule = %rule.id, %side, raw = raw.len(), "internal many-to-one candidates");
        accepted.extend(select_non_overlapping(raw));
    }
    HandlerOutput {
        accepted,
        truncated_searches,
    }
}

struct Proposal {
    candidate: Option<MatchCandidate>,
    truncated: bool,
}

fn propose(
    rule: &MatchingRule,
    strategy: RuleStrategy,
    anchor: &IndexedTransaction,
    index: &TransactionIndexes<'_>,
    limits: &SearchLimits,
) -> Proposal {
    let none = Proposal {
        candidate: None,
        truncated: false,
    };
    let Some(amount) = anchor.comparison_amount(rule.compare_currency) else {
        return none;
    };
    if amount.is_zero() {
        return none;
    }
    let partners = partners_for(anchor, amount, index, rule, limits.max_candidates_per_anchor);
    if partners.len() < 2 {
        return none;
    }

    // Partners were filtered on having a comparison amount.
    let amounts: Vec<i64> = partners
        .iter()
        .filter_map(|p| p.comparison_amount(rule.compare_currency))
        .map(|a| a.0)
        .collect();
    let query = SubsetQuery {
        target: (-amount).0,
        tolerance: rule.effective_tolerance().0,
        min_size: 2,
        max_size: limits.max_group_size,
    };
    let outcome = find_subset(&amounts, query, limits);
    if outcome.truncated {
        tracing::debug!(anchor = %anchor.id, partners = partners.len(), "subset search truncated");
    }

    let candidate = outcome.best.and_then(|best| {
        let group: Vec<&IndexedTransaction> = best.members.iter().map(|&i| partners[i]).collect();
        build_candidate(rule, strategy, &[anchor], &group)
    });
    Proposal {
        candidate,
        truncated: outcome.truncated,
    }
}

/// Partners that can help cancel `anchor`, closest dates first.
fn partners_for<'a>(
    anchor: &IndexedTransaction,
    amount: MinorUnits,
    index: &TransactionIndexes<'a>,
    rule: &MatchingRule,
    cap: usize,
) -> Vec<&'a IndexedTransaction> {
    let ceiling = amount.abs() + rule.effective_tolerance();
    let ids: Vec<TransactionId> = if rule.date_must_match {
        index
            .ids_near_date(anchor.comparison_date(rule.date_field), rule.date_tolerance_days)
            .collect()
    } else if amount.is_positive() {
        index
            .ids_in_amount_range(-ceiling, MinorUnits(-1))
            .collect()
    } else {
        index.ids_in_amount_range(MinorUnits(1), ceiling).collect()
    };

    let mut partners: Vec<&IndexedTransaction> = ids
        .into_iter()
        .filter_map(|id| index.get(id))
        .filter(|p| p.id != anchor.id)
        .filter(|p| {
            p.comparison_amount(rule.compare_currency)
                .is_some_and(|a| a.opposes(amount) && a.abs() <= ceiling)
        })
        .filter(|p| dates_match(anchor, p, rule))
        .filter(|p| {
            let (first, second) = condition_order(anchor, p);
            conditions_match(first, second, &rule.conditions)
        })
        .collect();
    partners.sort_by_key(|p| (day_difference(anchor, p, rule), p.id));
    partners.truncate(cap);
    partners
}

#[cfg(test)]
mod tests {
    use tally_types::{EngineConfig, RuleType};

    use super::*;

    fn limits() -> SearchLimits {
        SearchLimits::from_config(&EngineConfig::default(), std::time::Instant::now())
    }

    fn tx(id: u128, side: Side, amount: i64) -> IndexedTransaction {
        IndexedTransaction::dummy(id, side, amount, 19000)
    }

    fn ids(raw: &[u128]) -> Vec<TransactionId> {
        raw.iter().copied().map(TransactionId::from_u128).collect()
    }

    #[test]
    fn anchor_with_three_members_within_tolerance() {
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, -15000),
            tx(2, Side::Set2, 5000),
            tx(3, Side::Set2, 5000),
            tx(4, Side::Set2, 5050),
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToOne).with_tolerance(50);
        let out = cross_side(&rule, &ctx, &limits());
        assert_eq!(out.accepted.len(), 1);
        let c = &out.accepted[0];
        assert_eq!(c.set1_ids, ids(&[1]));
        assert_eq!(c.set2_ids, ids(&[2, 3, 4]));
        assert_eq!(c.difference, MinorUnits(50));
    }

    #[test]
    fn no_subset_within_tolerance() {
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, -15000),
            tx(2, Side::Set2, 5000),
            tx(3, Side::Set2, 5000),
            tx(4, Side::Set2, 5100),
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToOne).with_tolerance(50);
        assert!(cross_side(&rule, &ctx, &limits()).accepted.is_empty());
    }

    #[test]
    fn set2_can_anchor() {
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, 300),
            tx(2, Side::Set1, 700),
            tx(3, Side::Set1, 9999),
            tx(4, Side::Set2, -1000),
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToOne);
        let out = cross_side(&rule, &ctx, &limits());
        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.accepted[0].set1_ids, ids(&[1, 2]));
        assert_eq!(out.accepted[0].set2_ids, ids(&[4]));
    }

    #[test]
    fn same_sign_partners_ignored() {
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, -1000),
            tx(2, Side::Set2, -500),
            tx(3, Side::Set2, 1500),
            tx(4, Side::Set2, 500),
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToOne);
        assert!(cross_side(&rule, &ctx, &limits()).accepted.is_empty());
    }

    #[test]
    fn group_size_is_capped() {
        let mut txs = vec![tx(1, Side::Set1, -900)];
        txs.extend((0..9).map(|i| tx(10 + i, Side::Set2, 100)));
        let ctx = PipelineContext::from_transactions(txs);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToOne);
        // nine members needed, eight allowed
        assert!(cross_side(&rule, &ctx, &limits()).accepted.is_empty());
        let mut wide = limits();
        wide.max_group_size = 9;
        assert_eq!(cross_side(&rule, &ctx, &wide).accepted.len(), 1);
    }

    #[test]
    fn internal_group_within_one_side() {
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set2, -600),
            tx(2, Side::Set2, 200),
            tx(3, Side::Set2, 400),
            tx(4, Side::Set1, 600),
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToOne).internal();
        let out = internal(&rule, &ctx, &limits());
        assert_eq!(out.accepted.len(), 1);
        assert!(out.accepted[0].set1_ids.is_empty());
        assert_eq!(out.accepted[0].set2_ids, ids(&[1, 2, 3]));
    }

    #[test]
    fn unbounded_tolerance_does_not_overflow() {
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, -15000),
            tx(2, Side::Set2, 5000),
            tx(3, Side::Set2, 5000),
            tx(4, Side::Set2, 4000),
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToOne).with_tolerance(i64::MAX);
        let out = cross_side(&rule, &ctx, &limits());
        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.accepted[0].set2_ids, ids(&[2, 3, 4]));
        assert_eq!(out.accepted[0].difference, MinorUnits(-1000));
    }

    #[test]
    fn huge_day_window_stays_fast() {
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, -1000),
            tx(2, Side::Set2, 300),
            tx(3, Side::Set2, 700),
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToOne).with_dates(200_000_000);
        let started = std::time::Instant::now();
        let out = cross_side(&rule, &ctx, &limits());
        assert_eq!(out.accepted.len(), 1);
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn date_window_limits_partners() {
        let mut far = tx(3, Side::Set2, 5000);
        far.date = tally_types::EpochDay(19010);
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, -10000),
            tx(2, Side::Set2, 5000),
            far,
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToOne).with_dates(5);
        assert!(cross_side(&rule, &ctx, &limits()).accepted.is_empty());
        let wide = MatchingRule::dummy(1, 1, RuleType::ManyToOne).with_dates(10);
        assert_eq!(cross_side(&wide, &ctx, &limits()).accepted.len(), 1);
    }
}
