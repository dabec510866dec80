//! Rule handlers: candidate generation, then selection.
//!
//! Each handler is a pure function of `(rule, &PipelineContext)`. It
//! proposes raw, possibly overlapping candidates and runs the selector
//! over them; the pipeline applies the accepted ones to the pools.

mod many_to_many;
mod many_to_one;
mod one_to_one;

use tally_types::{
    IndexedTransaction, MatchCandidate, MatchingRule, MinorUnits, RuleStrategy, Side,
};

use crate::{PipelineContext, scorer::score_group, search::SearchLimits};

/// Accepted candidates of one rule application.
#[derive(Debug, Clone, Default)]
pub struct HandlerOutput {
    /// Non-overlapping, in selection order.
    pub accepted: Vec<MatchCandidate>,
    /// Subset searches that stopped on their budget or the deadline.
    pub truncated_searches: usize,
}

/// Dispatch a rule to the algorithm its strategy names.
#[must_use]
pub fn run_strategy(
    strategy: RuleStrategy,
    rule: &MatchingRule,
    ctx: &PipelineContext,
    limits: &SearchLimits,
) -> HandlerOutput {
    match strategy {
        RuleStrategy::OneToOne => one_to_one::cross_side(rule, ctx, limits),
        RuleStrategy::InternalOneToOne => one_to_one::internal(rule, ctx, limits),
        RuleStrategy::ManyToOne => many_to_one::cross_side(rule, ctx, limits),
        RuleStrategy::InternalManyToOne => many_to_one::internal(rule, ctx, limits),
        RuleStrategy::ManyToMany => many_to_many::cross_side(rule, ctx, limits),
    }
}

/// Build and score a candidate from the two sides of a group.
///
/// `left` is the anchor side (or Set 1); IDs are filed by each
/// transaction's own side, sorted. The difference is the signed sum of
/// every comparison amount. Returns `None` if a member lacks one.
fn build_candidate(
    rule: &MatchingRule,
    strategy: RuleStrategy,
    left: &[&IndexedTransaction],
    right: &[&IndexedTransaction],
) -> Option<MatchCandidate> {
    let mut difference = MinorUnits::ZERO;
    let mut set1_ids = Vec::new();
    let mut set2_ids = Vec::new();
    for tx in left.iter().chain(right) {
        difference += tx.comparison_amount(rule.compare_currency)?;
        match tx.side {
            Side::Set1 => set1_ids.push(tx.id),
            Side::Set2 => set2_ids.push(tx.id),
        }
    }
    set1_ids.sort_unstable();
    set2_ids.sort_unstable();

    Some(MatchCandidate {
        set1_ids,
        set2_ids,
        rule_id: rule.id,
        rule_priority: rule.priority,
        strategy,
        score: score_group(left, right, difference, rule),
        difference,
    })
}

/// Orders a group's two members as (Set 1, Set 2) for condition checks.
/// Same-side pairs keep their given order.
fn condition_order<'t>(
    a: &'t IndexedTransaction,
    b: &'t IndexedTransaction,
) -> (&'t IndexedTransaction, &'t IndexedTransaction) {
    if a.side == Side::Set2 && b.side == Side::Set1 {
        (b, a)
    } else {
        (a, b)
    }
}
