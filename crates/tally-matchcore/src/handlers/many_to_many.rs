//! Many-to-many matching over small clusters.
//!
//! Transactions from both sides are clustered by date (bucketed by the
//! day tolerance when dates must match, each transaction joining its own
//! and the following bucket) and, separately, by normalized reference.
//! Within a cluster each side's subsets are enumerated and joined on sum;
//! a Set-1 subset and a Set-2 subset pair up when their sums cancel within
//! tolerance and they hold at least three transactions together. Matched
//! members leave the cluster and the search repeats.
//!
//! A transaction may sit in a date cluster and a reference cluster at the
//! same time; the selector resolves the overlap.

use std::collections::{BTreeMap, HashMap};

use tally_types::{IndexedTransaction, MatchCandidate, MatchingRule, RuleStrategy, Side};

use super::{HandlerOutput, build_candidate};
use crate::{
    PipelineContext,
    matchers::{conditions_match, dates_match},
    search::{SearchBudget, SearchLimits, enumerate_subsets},
    selector::select_non_overlapping,
};

/// Fewest transactions in a many-to-many group. Two would be a 1:1 pair.
const MIN_GROUP_TRANSACTIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum ClusterKey {
    Date(i32),
    Reference(String),
}

#[derive(Default)]
struct Cluster<'a> {
    set1: Vec<&'a IndexedTransaction>,
    set2: Vec<&'a IndexedTransaction>,
}

pub(super) fn cross_side(
    rule: &MatchingRule,
    ctx: &PipelineContext,
    limits: &SearchLimits,
) -> HandlerOutput {
    let clusters = build_clusters(rule, ctx, limits.max_cluster_size);
    let mut raw = Vec::new();
    let mut truncated_searches = 0;
    for (key, cluster) in clusters {
        if limits.deadline_passed() {
            tracing::warn!(rule = %rule.id, "rule deadline passed, stopping cluster scan");
            truncated_searches += 1;
            break;
        }
        let mut budget = SearchBudget::new(limits.max_subset_enumerations, limits.deadline);
        solve_cluster(rule, cluster, limits.max_group_size, &mut budget, &mut raw);
        if budget.is_exhausted() {
            tracing::debug!(rule = %rule.id, ?key, "cluster enumeration truncated");
            truncated_searches += 1;
        }
    }

    tracing::debug!(rule = %rule.id, raw = raw.len(), truncated_searches, "many-to-many candidates");
    HandlerOutput {
        accepted: select_non_overlapping(raw),
        truncated_searches,
    }
}

/// Clusters holding both sides, in key order. Zero and missing
/// comparison amounts are left out: they cannot move a subset sum.
fn build_clusters<'a>(
    rule: &MatchingRule,
    ctx: &'a PipelineContext,
    max_cluster_size: usize,
) -> BTreeMap<ClusterKey, Cluster<'a>> {
    let bucket_width = if rule.date_must_match {
        i32::try_from(rule.date_tolerance_days).unwrap_or(i32::MAX - 1) + 1
    } else {
        1
    };
    // Dates within tolerance fall in the same or adjacent buckets, so each
    // transaction also joins the next bucket's cluster.
    let straddle = rule.date_must_match && rule.date_tolerance_days > 0;

    let mut clusters: BTreeMap<ClusterKey, Cluster<'a>> = BTreeMap::new();
    for side in Side::BOTH {
        for tx in ctx.pool(side).values() {
            let usable = tx
                .comparison_amount(rule.compare_currency)
                .is_some_and(|a| !a.is_zero());
            if !usable {
                continue;
            }
            let bucket = tx.comparison_date(rule.date_field).0.div_euclid(bucket_width);
            let mut keys = vec![ClusterKey::Date(bucket)];
            if straddle {
                keys.push(ClusterKey::Date(bucket.saturating_add(1)));
            }
            if let Some(reference) = tx.reference.as_deref().and_then(normalize_reference) {
                keys.push(ClusterKey::Reference(reference));
            }
            for key in keys {
                let cluster = clusters.entry(key).or_default();
                let members = match side {
                    Side::Set1 => &mut cluster.set1,
                    Side::Set2 => &mut cluster.set2,
                };
                if members.len() < max_cluster_size {
                    members.push(tx);
                }
            }
        }
    }
    clusters.retain(|_, c| !c.set1.is_empty() && !c.set2.is_empty());
    clusters
}

/// Lowercase alphanumerics only, so `"INV-001"` and `"inv 001"` agree.
fn normalize_reference(reference: &str) -> Option<String> {
    let normalized: String = reference
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    (!normalized.is_empty()).then_some(normalized)
}

/// Repeatedly find the best balancing subset pair and remove it.
fn solve_cluster<'a>(
    rule: &MatchingRule,
    mut cluster: Cluster<'a>,
    max_group_size: usize,
    budget: &mut SearchBudget,
    out: &mut Vec<MatchCandidate>,
) {
    loop {
        if cluster.set1.is_empty() || cluster.set2.is_empty() || budget.is_exhausted() {
            return;
        }
        let Some((left, right)) = best_pair(rule, &cluster, max_group_size, budget) else {
            return;
        };
        let set1: Vec<&'a IndexedTransaction> = left.iter().map(|&i| cluster.set1[i]).collect();
        let set2: Vec<&'a IndexedTransaction> = right.iter().map(|&i| cluster.set2[i]).collect();
        if let Some(candidate) = build_candidate(rule, RuleStrategy::ManyToMany, &set1, &set2) {
            out.push(candidate);
        }
        cluster.set1 = remove_indices(&cluster.set1, &left);
        cluster.set2 = remove_indices(&cluster.set2, &right);
    }
}

/// The subset pair with the smallest residual. Ties go to the pair found
/// first: smaller Set-1 subsets first, then Set-2 subsets in enumeration
/// order.
fn best_pair(
    rule: &MatchingRule,
    cluster: &Cluster<'_>,
    max_group_size: usize,
    budget: &mut SearchBudget,
) -> Option<(Vec<usize>, Vec<usize>)> {
    let amount = |tx: &IndexedTransaction| {
        tx.comparison_amount(rule.compare_currency)
            .map_or(0, |a| a.0)
    };
    let a1: Vec<i64> = cluster.set1.iter().map(|tx| amount(*tx)).collect();
    let a2: Vec<i64> = cluster.set2.iter().map(|tx| amount(*tx)).collect();
    let subsets1 = enumerate_subsets(&a1, max_group_size, budget);
    let subsets2 = enumerate_subsets(&a2, max_group_size, budget);

    // Sorted by sum, then enumeration order, for range scans.
    let mut by_sum: Vec<usize> = (0..subsets2.len()).collect();
    by_sum.sort_by_key(|&j| (subsets2[j].1, j));
    let mut exact: HashMap<i64, Vec<usize>> = HashMap::new();
    for &j in &by_sum {
        exact.entry(subsets2[j].1).or_default().push(j);
    }

    let tolerance = rule.effective_tolerance().0;
    let mut best: Option<(i64, usize, usize)> = None;
    'outer: for (i, (members1, sum1)) in subsets1.iter().enumerate() {
        if *sum1 == 0 {
            continue;
        }
        let need = sum1.saturating_neg();
        let consider = |j: usize, best: &mut Option<(i64, usize, usize)>| -> bool {
            let (members2, sum2) = &subsets2[j];
            if *sum2 == 0 || members1.len() + members2.len() < MIN_GROUP_TRANSACTIONS {
                return false;
            }
            let residual = sum1.saturating_add(*sum2).saturating_abs();
            if residual > tolerance || best.is_some_and(|(r, _, _)| residual >= r) {
                return false;
            }
            if !cross_pairs_match(rule, cluster, members1, members2) {
                return false;
            }
            *best = Some((residual, i, j));
            residual == 0
        };

        if tolerance == 0 {
            for &j in exact.get(&need).into_iter().flatten() {
                if consider(j, &mut best) {
                    break 'outer;
                }
            }
        } else {
            let (low, high) = (need.saturating_sub(tolerance), need.saturating_add(tolerance));
            let start = by_sum.partition_point(|&j| subsets2[j].1 < low);
            for &j in by_sum[start..]
                .iter()
                .take_while(|&&j| subsets2[j].1 <= high)
            {
                if consider(j, &mut best) {
                    break 'outer;
                }
            }
        }
    }

    best.map(|(_, i, j)| (subsets1[i].0.clone(), subsets2[j].0.clone()))
}

/// Every Set-1/Set-2 pair in the group satisfies dates and conditions.
fn cross_pairs_match(
    rule: &MatchingRule,
    cluster: &Cluster<'_>,
    members1: &[usize],
    members2: &[usize],
) -> bool {
    members1.iter().all(|&i| {
        members2.iter().all(|&j| {
            let (a, b) = (cluster.set1[i], cluster.set2[j]);
            dates_match(a, b, rule) && conditions_match(a, b, &rule.conditions)
        })
    })
}

fn remove_indices<'a>(
    members: &[&'a IndexedTransaction],
    remove: &[usize],
) -> Vec<&'a IndexedTransaction> {
    members
        .iter()
        .enumerate()
        .filter(|(i, _)| !remove.contains(i))
        .map(|(_, tx)| *tx)
        .collect()
}

#[cfg(test)]
mod tests {
    use tally_types::{EngineConfig, EpochDay, MinorUnits, RuleType, TransactionId};

    use super::*;

    fn limits() -> SearchLimits {
        SearchLimits::from_config(&EngineConfig::default(), std::time::Instant::now())
    }

    fn tx(id: u128, side: Side, amount: i64, date: i32) -> IndexedTransaction {
        IndexedTransaction::dummy(id, side, amount, date)
    }

    fn ids(raw: &[u128]) -> Vec<TransactionId> {
        raw.iter().copied().map(TransactionId::from_u128).collect()
    }

    #[test]
    fn two_by_two_same_day() {
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, 300, 19000),
            tx(2, Side::Set1, 700, 19000),
            tx(3, Side::Set2, -400, 19000),
            tx(4, Side::Set2, -600, 19000),
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToMany);
        let out = cross_side(&rule, &ctx, &limits());
        assert_eq!(out.accepted.len(), 1);
        let c = &out.accepted[0];
        assert_eq!(c.set1_ids, ids(&[1, 2]));
        assert_eq!(c.set2_ids, ids(&[3, 4]));
        assert_eq!(c.difference, MinorUnits::ZERO);
    }

    #[test]
    fn different_days_do_not_cluster() {
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, 300, 19000),
            tx(2, Side::Set1, 700, 19001),
            tx(3, Side::Set2, -1000, 19000),
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToMany);
        assert!(cross_side(&rule, &ctx, &limits()).accepted.is_empty());
    }

    #[test]
    fn shared_reference_clusters_across_days() {
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, 300, 19000).with_reference("INV-77"),
            tx(2, Side::Set1, 700, 19004).with_reference("inv 77"),
            tx(3, Side::Set2, -1000, 19009).with_reference("Inv77"),
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToMany);
        let out = cross_side(&rule, &ctx, &limits());
        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.accepted[0].transaction_count(), 3);
    }

    #[test]
    fn one_to_one_pairs_are_left_alone() {
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, 500, 19000),
            tx(2, Side::Set2, -500, 19000),
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToMany);
        assert!(cross_side(&rule, &ctx, &limits()).accepted.is_empty());
    }

    #[test]
    fn cluster_yields_several_groups() {
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, 100, 19000),
            tx(2, Side::Set1, 200, 19000),
            tx(3, Side::Set1, 1000, 19000),
            tx(4, Side::Set2, -300, 19000),
            tx(5, Side::Set2, -400, 19000),
            tx(6, Side::Set2, -600, 19000),
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToMany);
        let out = cross_side(&rule, &ctx, &limits());
        assert_eq!(out.accepted.len(), 2);
        let used: usize = out.accepted.iter().map(MatchCandidate::transaction_count).sum();
        assert_eq!(used, 6);
    }

    #[test]
    fn date_bucket_follows_tolerance() {
        let mut late = tx(3, Side::Set2, -1000, 19001);
        late.date = EpochDay(19001);
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, 300, 19000),
            tx(2, Side::Set1, 700, 19000),
            late,
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToMany).with_dates(1);
        let out = cross_side(&rule, &ctx, &limits());
        assert_eq!(out.accepted.len(), 1);
    }

    #[test]
    fn straddling_days_share_a_cluster() {
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, 300, 19001),
            tx(2, Side::Set1, 700, 19001),
            tx(3, Side::Set2, -1000, 19002),
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToMany).with_dates(1);
        let out = cross_side(&rule, &ctx, &limits());
        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.accepted[0].set1_ids, ids(&[1, 2]));
        assert_eq!(out.accepted[0].set2_ids, ids(&[3]));

        // Shared bucket, but two days apart.
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, 300, 19001),
            tx(2, Side::Set1, 700, 19001),
            tx(3, Side::Set2, -1000, 19003),
        ]);
        assert!(cross_side(&rule, &ctx, &limits()).accepted.is_empty());
    }

    #[test]
    fn unbounded_tolerance_does_not_overflow() {
        let ctx = PipelineContext::from_transactions([
            tx(1, Side::Set1, 300, 19000),
            tx(2, Side::Set1, 700, 19000),
            tx(3, Side::Set2, -900, 19000),
        ]);
        let rule = MatchingRule::dummy(1, 1, RuleType::ManyToMany).with_tolerance(i64::MAX);
        let out = cross_side(&rule, &ctx, &limits());
        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.accepted[0].transaction_count(), 3);
        assert_eq!(out.accepted[0].difference, MinorUnits(100));
    }

    #[test]
    fn reference_normalization() {
        assert_eq!(normalize_reference(" INV-001 ").as_deref(), Some("inv001"));
        assert_eq!(normalize_reference("--"), None);
    }
}
