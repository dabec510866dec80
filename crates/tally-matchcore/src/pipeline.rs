//! The rule pipeline: a sequential reducer over the pools.
//!
//! ```text
//! for rule in active rules, ascending (priority, id):
//!     validate          -> skip + record on error
//!     pool-size guard   -> skip + record when an expensive rule sees a pool > ceiling
//!     run handler       -> accepted candidates (pure, borrows the context)
//!     time check        -> warn past the budget, never abort
//!     commit            -> remove IDs from the pools; reject malformed ones
//! ```
//!
//! Rules run strictly one after another: each rule sees the pools left by
//! the rules before it.

use std::time::Instant;

use tally_types::{EngineConfig, MatchingRule, RuleStats, SkipReason};

use crate::{
    PipelineContext, determinism::compute_match_root, handlers::run_strategy,
    search::SearchLimits,
};

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Final pools plus every committed candidate, in commit order.
    pub context: PipelineContext,
    /// One entry per active rule, in execution order.
    pub rule_stats: Vec<RuleStats>,
    pub elapsed_ms: u64,
    /// Hash over the committed candidates.
    pub match_root: [u8; 32],
}

impl PipelineOutcome {
    #[must_use]
    pub fn total_matches(&self) -> usize {
        self.context.committed().len()
    }

    #[must_use]
    pub fn total_transactions(&self) -> usize {
        self.context
            .committed()
            .iter()
            .map(tally_types::MatchCandidate::transaction_count)
            .sum()
    }
}

/// Run every active rule against `context`.
///
/// Never fails: invalid rules, oversized pools and malformed candidates
/// are recorded in the per-rule stats and logged.
#[must_use]
pub fn run_pipeline(
    mut context: PipelineContext,
    rules: &[MatchingRule],
    config: &EngineConfig,
) -> PipelineOutcome {
    let started = Instant::now();
    let mut active: Vec<&MatchingRule> = rules.iter().filter(|r| r.active).collect();
    active.sort_by_key(|r| (r.priority, r.id));

    tracing::info!(
        rules = active.len(),
        set1 = context.pool(tally_types::Side::Set1).len(),
        set2 = context.pool(tally_types::Side::Set2).len(),
        "Pipeline started"
    );

    let mut rule_stats = Vec::with_capacity(active.len());
    for rule in active {
        let stats = run_rule(&mut context, rule, config);
        rule_stats.push(stats);
    }

    let match_root = compute_match_root(context.committed());
    let elapsed_ms = elapsed_ms(started);
    tracing::info!(
        matches = context.committed().len(),
        unmatched = context.unmatched(),
        elapsed_ms,
        match_root = %hex::encode(&match_root[..8]),
        "Pipeline finished"
    );

    PipelineOutcome {
        context,
        rule_stats,
        elapsed_ms,
        match_root,
    }
}

fn run_rule(context: &mut PipelineContext, rule: &MatchingRule, config: &EngineConfig) -> RuleStats {
    let mut stats = RuleStats {
        rule_id: rule.id,
        rule_name: rule.name.clone(),
        priority: rule.priority,
        matches: 0,
        transactions: 0,
        rejected: 0,
        elapsed_ms: 0,
        over_budget: false,
        skipped: None,
    };

    let strategy = match rule.validate() {
        Ok(strategy) => strategy,
        Err(e) => {
            tracing::warn!(rule = %rule.id, name = %rule.name, error = %e, "Skipping invalid rule");
            stats.skipped = Some(SkipReason::InvalidRule {
                message: e.to_string(),
            });
            return stats;
        }
    };

    let pool_size = context.largest_pool();
    if strategy.is_expensive() && pool_size > config.expensive_pool_ceiling {
        tracing::warn!(
            rule = %rule.id,
            name = %rule.name,
            %strategy,
            pool_size,
            ceiling = config.expensive_pool_ceiling,
            "Skipping expensive rule: pool too large"
        );
        stats.skipped = Some(SkipReason::PoolTooLarge {
            pool_size,
            ceiling: config.expensive_pool_ceiling,
        });
        return stats;
    }

    let started = Instant::now();
    let limits = SearchLimits::from_config(config, started);
    let output = run_strategy(strategy, rule, context, &limits);

    let elapsed = started.elapsed();
    stats.elapsed_ms = elapsed_ms(started);
    if elapsed > config.rule_time_budget {
        stats.over_budget = true;
        tracing::warn!(
            rule = %rule.id,
            name = %rule.name,
            elapsed_ms = stats.elapsed_ms,
            budget_ms = config.rule_time_budget.as_millis() as u64,
            "Rule exceeded time budget"
        );
    }
    if output.truncated_searches > 0 {
        tracing::debug!(rule = %rule.id, truncated = output.truncated_searches, "Searches truncated");
    }

    for candidate in output.accepted {
        let count = candidate.transaction_count();
        match context.commit(candidate) {
            Ok(()) => {
                stats.matches += 1;
                stats.transactions += count;
            }
            Err(e) => {
                stats.rejected += 1;
                tracing::warn!(rule = %rule.id, error = %e, "Rejected candidate");
            }
        }
    }

    tracing::info!(
        rule = %rule.id,
        name = %rule.name,
        priority = rule.priority,
        %strategy,
        matches = stats.matches,
        transactions = stats.transactions,
        elapsed_ms = stats.elapsed_ms,
        "Rule applied"
    );
    stats
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
