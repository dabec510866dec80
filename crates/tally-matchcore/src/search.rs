//! Bounded subset-sum search.
//!
//! Every search takes a [`SearchBudget`]. When the budget runs out (step
//! cap or deadline), the search stops and returns its best result so far,
//! flagged as truncated. Truncation can only lose matches, never produce
//! an out-of-tolerance one.
//!
//! Two strategies for the target-sum problem:
//!
//! - **Meet in the middle** for small inputs: enumerate the subset sums of
//!   each half and join them (hash join when exact, sorted range scan
//!   under tolerance).
//! - **Backtracking** for larger inputs: depth-first over the input order
//!   with reachable-range pruning.
//!
//! Sums saturate at the `i64` limits.
//!
//! Among equally good results the first one found wins. Enumeration order
//! depends only on the input order, so results are deterministic.

use std::collections::HashMap;
use std::time::Instant;

use tally_types::{EngineConfig, constants};

/// Largest input meet-in-the-middle will take; each half is enumerated
/// with a `u32` mask.
const MAX_MEET_IN_MIDDLE_INPUT: usize = 40;

/// Search limits for one rule application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_group_size: usize,
    pub max_candidates_per_anchor: usize,
    pub max_backtrack_iterations: u64,
    pub max_subset_enumerations: u64,
    pub meet_in_middle_threshold: usize,
    pub max_cluster_size: usize,
    /// Cooperative deadline for the whole rule.
    pub deadline: Option<Instant>,
}

impl SearchLimits {
    /// Limits from config, with the deadline measured from `started`.
    #[must_use]
    pub fn from_config(config: &EngineConfig, started: Instant) -> Self {
        Self {
            max_group_size: config.max_group_size,
            max_candidates_per_anchor: config.max_candidates_per_anchor,
            max_backtrack_iterations: config.max_backtrack_iterations,
            max_subset_enumerations: config.max_subset_enumerations,
            meet_in_middle_threshold: config.meet_in_middle_threshold,
            max_cluster_size: config.max_cluster_size,
            deadline: config.rule_deadline.map(|d| started + d),
        }
    }

    /// Whether the rule deadline has already passed.
    #[must_use]
    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Decrementing step counter with an optional wall-clock deadline.
///
/// The clock is read only every `DEADLINE_CHECK_INTERVAL` steps.
#[derive(Debug, Clone)]
pub struct SearchBudget {
    remaining: u64,
    steps: u64,
    deadline: Option<Instant>,
    exhausted: bool,
}

impl SearchBudget {
    #[must_use]
    pub fn new(steps: u64, deadline: Option<Instant>) -> Self {
        Self {
            remaining: steps,
            steps: 0,
            deadline,
            exhausted: false,
        }
    }

    /// Spend one step. Returns `false` once the budget is gone.
    pub fn tick(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        if self.remaining == 0 {
            self.exhausted = true;
            return false;
        }
        self.remaining -= 1;
        self.steps += 1;
        if self.steps % constants::DEADLINE_CHECK_INTERVAL == 0
            && self.deadline.is_some_and(|d| Instant::now() >= d)
        {
            self.exhausted = true;
            return false;
        }
        true
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

/// A subset of the input, by ascending index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsetMatch {
    pub members: Vec<usize>,
    pub sum: i64,
    /// `|sum - target|`.
    pub residual: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    pub best: Option<SubsetMatch>,
    /// The budget ran out before the search space was exhausted.
    pub truncated: bool,
}

/// Size and tolerance bounds of one target-sum query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsetQuery {
    pub target: i64,
    pub tolerance: i64,
    pub min_size: usize,
    pub max_size: usize,
}

impl SubsetQuery {
    fn accepts(&self, size: usize, sum: i64) -> Option<i64> {
        if size < self.min_size || size > self.max_size {
            return None;
        }
        let residual = sum.abs_diff(self.target);
        let residual = i64::try_from(residual).ok()?;
        (residual <= self.tolerance).then_some(residual)
    }
}

/// Find the subset of `amounts` whose sum is closest to `query.target`,
/// within tolerance and size bounds.
///
/// Uses meet-in-the-middle when the input is at most
/// `limits.meet_in_middle_threshold` long, backtracking otherwise.
#[must_use]
pub fn find_subset(amounts: &[i64], query: SubsetQuery, limits: &SearchLimits) -> SearchOutcome {
    if amounts.is_empty() || query.max_size == 0 || query.min_size > amounts.len() {
        return SearchOutcome::default();
    }
    if amounts.len() <= limits.meet_in_middle_threshold.min(MAX_MEET_IN_MIDDLE_INPUT) {
        let mut budget = SearchBudget::new(limits.max_subset_enumerations, limits.deadline);
        meet_in_middle(amounts, query, &mut budget)
    } else {
        let mut budget = SearchBudget::new(limits.max_backtrack_iterations, limits.deadline);
        backtrack(amounts, query, &mut budget)
    }
}

/// One enumerated half-subset.
#[derive(Debug, Clone, Copy)]
struct HalfSum {
    mask: u32,
    size: usize,
    sum: i64,
}

fn enumerate_half(amounts: &[i64], max_size: usize, budget: &mut SearchBudget) -> Vec<HalfSum> {
    let mut sums = Vec::with_capacity(1 << amounts.len());
    for mask in 0u32..(1u32 << amounts.len()) {
        let size = mask.count_ones() as usize;
        if size > max_size {
            continue;
        }
        if !budget.tick() {
            break;
        }
        let sum = amounts
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, a)| *a)
            .fold(0, i64::saturating_add);
        sums.push(HalfSum { mask, size, sum });
    }
    sums
}

fn meet_in_middle(amounts: &[i64], query: SubsetQuery, budget: &mut SearchBudget) -> SearchOutcome {
    let split = amounts.len() / 2;
    let (low, high) = amounts.split_at(split);
    let left = enumerate_half(low, query.max_size, budget);
    let mut right = enumerate_half(high, query.max_size, budget);

    let members = |l: &HalfSum, r: &HalfSum| -> Vec<usize> {
        (0..split)
            .filter(|i| l.mask & (1 << i) != 0)
            .chain((0..high.len()).filter(|i| r.mask & (1 << i) != 0).map(|i| i + split))
            .collect()
    };

    let mut best: Option<SubsetMatch> = None;
    if query.tolerance == 0 {
        let mut by_sum: HashMap<i64, Vec<HalfSum>> = HashMap::new();
        for r in &right {
            by_sum.entry(r.sum).or_default().push(*r);
        }
        for l in &left {
            if !budget.tick() {
                break;
            }
            let Some(need) = query.target.checked_sub(l.sum) else {
                continue;
            };
            let Some(partners) = by_sum.get(&need) else {
                continue;
            };
            if let Some(r) = partners
                .iter()
                .find(|r| query.accepts(l.size + r.size, l.sum.saturating_add(r.sum)).is_some())
            {
                best = Some(SubsetMatch {
                    members: members(l, r),
                    sum: l.sum.saturating_add(r.sum),
                    residual: 0,
                });
                break;
            }
        }
    } else {
        right.sort_by_key(|r| (r.sum, r.mask));
        'outer: for l in &left {
            if !budget.tick() {
                break;
            }
            let need = query.target.saturating_sub(l.sum);
            let lo = need.saturating_sub(query.tolerance);
            let hi = need.saturating_add(query.tolerance);
            let start = right.partition_point(|r| r.sum < lo);
            for r in right[start..].iter().take_while(|r| r.sum <= hi) {
                let Some(residual) = query.accepts(l.size + r.size, l.sum.saturating_add(r.sum)) else {
                    continue;
                };
                if best.as_ref().is_none_or(|b| residual < b.residual) {
                    best = Some(SubsetMatch {
                        members: members(l, r),
                        sum: l.sum.saturating_add(r.sum),
                        residual,
                    });
                    if residual == 0 {
                        break 'outer;
                    }
                }
            }
        }
    }

    SearchOutcome {
        best,
        truncated: budget.is_exhausted(),
    }
}

/// Depth-first search state.
struct Backtracker<'a> {
    amounts: &'a [i64],
    query: SubsetQuery,
    /// `suffix_pos[i]`: sum of positive amounts at `i..`.
    suffix_pos: Vec<i64>,
    /// `suffix_neg[i]`: sum of negative amounts at `i..`.
    suffix_neg: Vec<i64>,
    stack: Vec<usize>,
    best: Option<SubsetMatch>,
}

impl Backtracker<'_> {
    fn visit(&mut self, start: usize, sum: i64, budget: &mut SearchBudget) {
        if !budget.tick() {
            return;
        }
        if let Some(residual) = self.query.accepts(self.stack.len(), sum) {
            if self.best.as_ref().is_none_or(|b| residual < b.residual) {
                self.best = Some(SubsetMatch {
                    members: self.stack.clone(),
                    sum,
                    residual,
                });
            }
        }
        if self.stack.len() >= self.query.max_size || self.found_exact() {
            return;
        }
        for i in start..self.amounts.len() {
            if self.found_exact() || budget.is_exhausted() {
                return;
            }
            // Target unreachable with whatever remains from i on.
            let reach_low = sum.saturating_add(self.suffix_neg[i]);
            let reach_high = sum.saturating_add(self.suffix_pos[i]);
            if reach_high < self.query.target.saturating_sub(self.query.tolerance)
                || reach_low > self.query.target.saturating_add(self.query.tolerance)
            {
                return;
            }
            self.stack.push(i);
            self.visit(i + 1, sum.saturating_add(self.amounts[i]), budget);
            self.stack.pop();
        }
    }

    fn found_exact(&self) -> bool {
        self.best.as_ref().is_some_and(|b| b.residual == 0)
    }
}

fn backtrack(amounts: &[i64], query: SubsetQuery, budget: &mut SearchBudget) -> SearchOutcome {
    let n = amounts.len();
    let mut suffix_pos = vec![0i64; n + 1];
    let mut suffix_neg = vec![0i64; n + 1];
    for i in (0..n).rev() {
        suffix_pos[i] = suffix_pos[i + 1].saturating_add(amounts[i].max(0));
        suffix_neg[i] = suffix_neg[i + 1].saturating_add(amounts[i].min(0));
    }
    let mut search = Backtracker {
        amounts,
        query,
        suffix_pos,
        suffix_neg,
        stack: Vec::with_capacity(query.max_size),
        best: None,
    };
    search.visit(0, 0, budget);
    SearchOutcome {
        best: search.best,
        truncated: budget.is_exhausted(),
    }
}

/// Every non-empty subset of `amounts` with at most `max_size` members, by
/// size and then lexicographically by index, with its sum.
///
/// Stops early when the budget runs out.
pub fn enumerate_subsets(
    amounts: &[i64],
    max_size: usize,
    budget: &mut SearchBudget,
) -> Vec<(Vec<usize>, i64)> {
    let n = amounts.len();
    let mut out = Vec::new();
    for size in 1..=max_size.min(n) {
        let mut combo: Vec<usize> = (0..size).collect();
        loop {
            if !budget.tick() {
                return out;
            }
            let sum = combo.iter().map(|&i| amounts[i]).fold(0, i64::saturating_add);
            out.push((combo.clone(), sum));

            // Advance to the next combination in lexicographic order.
            let Some(pos) = (0..size).rev().find(|&p| combo[p] < n - size + p) else {
                break;
            };
            combo[pos] += 1;
            for p in pos + 1..size {
                combo[p] = combo[p - 1] + 1;
            }
        }
    }
    out
}
