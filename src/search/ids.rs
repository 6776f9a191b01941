//! `IDS`: iterative deepening on the determinized task, using
//! [`super::dfs::Dfs`]-style search at increasing horizons, with a
//! one-off learning phase that fixes the maximum depth against a
//! timeout budget.

use super::engine::{EngineContext, SearchEngine};
use super::minimal_lookahead::MinimalLookahead;
use crate::state::State;
use crate::{HashKey, Reward};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// termination at run time: timeout, horizon reached, or an
/// informative result.
#[derive(Debug, Clone, Copy)]
pub struct IdsConfig {
    pub timeout: Duration,
    pub minimum_depth: u32,
    pub learning_timeout_per_depth: Duration,
}

impl Default for IdsConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(100),
            minimum_depth: 1,
            learning_timeout_per_depth: Duration::from_millis(10),
        }
    }
}

pub struct Ids {
    config: IdsConfig,
    max_depth: u32,
    /// Q-vectors cached by state, ignoring steps-to-go, with a
    /// fallback to [`MinimalLookahead`] when learning finds no depth
    /// within budget.
    memo: Mutex<HashMap<HashKey, Vec<Reward>>>,
    fallback: MinimalLookahead,
}

impl Ids {
    pub fn new(config: IdsConfig) -> Self {
        Self {
            config,
            max_depth: 0,
            memo: Mutex::new(HashMap::new()),
            fallback: MinimalLookahead,
        }
    }

    /// the depth `learn` settled on; `0` before learning or when even
    /// `minimum_depth` exceeded the timeout budget.
    pub fn learned_depth(&self) -> u32 {
        self.max_depth
    }

    /// learning phase: run depth-bounded DFS on a training set of
    /// sampled states, measure wall time per depth, and fix the
    /// maximum depth to the largest whose average is below the
    /// learning timeout; falls back to `MinimalLookahead` if even
    /// `minimum_depth` exceeds budget.
    pub fn learn(&mut self, ctx: &EngineContext, training_states: &[State]) {
        let bar = crate::progress(training_states.len());
        let mut depth = self.config.minimum_depth;
        let mut chosen = 0;
        loop {
            let start = Instant::now();
            for state in training_states {
                let applicable = ctx.task.applicable_actions(state, true);
                let _ = self.estimate_q_values_bounded(ctx, state, &applicable, depth);
                bar.inc(1);
            }
            let average = start.elapsed() / training_states.len().max(1) as u32;
            if average > self.config.learning_timeout_per_depth {
                break;
            }
            chosen = depth;
            depth += 1;
            bar.set_length((training_states.len() as u64) * (depth as u64 - self.config.minimum_depth as u64 + 1));
        }
        bar.finish_and_clear();
        self.max_depth = chosen;
        self.memo.lock().expect("IDS memo poisoned").clear();
    }

    fn estimate_q_values_bounded(&self, ctx: &EngineContext, state: &State, applicable: &[i64], depth: u32) -> Vec<Reward> {
        applicable
            .iter()
            .enumerate()
            .map(|(a, &entry)| {
                if entry < 0 {
                    return Reward::NEG_INFINITY;
                }
                let action = &ctx.task.action_states[a];
                let (successor, reward) = ctx.task.calc_state_transition_deterministic(state, action);
                reward + ctx.task.discount * self.bounded_value(ctx, &successor, depth.saturating_sub(1))
            })
            .collect()
    }

    fn bounded_value(&self, ctx: &EngineContext, state: &State, depth_remaining: u32) -> Reward {
        if state.steps_to_go() == 0 || depth_remaining == 0 {
            return 0.0;
        }
        let applicable = ctx.task.applicable_actions(state, true);
        self.estimate_q_values_bounded(ctx, state, &applicable, depth_remaining)
            .into_iter()
            .fold(Reward::NEG_INFINITY, Reward::max)
    }
}

impl SearchEngine for Ids {
    fn estimate_q_values(&self, ctx: &EngineContext, state: &State, applicable: &[i64]) -> Vec<Reward> {
        if self.max_depth < self.config.minimum_depth {
            return self.fallback.estimate_q_values(ctx, state, applicable);
        }
        let key = state.hash_key();
        if key != crate::HASH_DISABLED {
            if let Some(cached) = self.memo.lock().expect("IDS memo poisoned").get(&key) {
                return cached.clone();
            }
        }
        let deadline = Instant::now() + self.config.timeout;
        let mut best = self.estimate_q_values_bounded(ctx, state, applicable, self.config.minimum_depth);
        for depth in (self.config.minimum_depth + 1)..=self.max_depth {
            if Instant::now() >= deadline || is_informative(&best) {
                break;
            }
            best = self.estimate_q_values_bounded(ctx, state, applicable, depth);
        }
        if key != crate::HASH_DISABLED {
            self.memo.lock().expect("IDS memo poisoned").insert(key, best.clone());
        }
        best
    }

    fn caches(&self) -> bool {
        true
    }
}

/// "informative": some action's Q strictly dominates, or two
/// applicable actions diverge.
fn is_informative(q: &[Reward]) -> bool {
    let applicable: Vec<Reward> = q.iter().copied().filter(|v| v.is_finite()).collect();
    if applicable.len() < 2 {
        return true;
    }
    let max = applicable.iter().cloned().fold(Reward::NEG_INFINITY, Reward::max);
    let min = applicable.iter().cloned().fold(Reward::INFINITY, Reward::min);
    (max - min).abs() > crate::EPSILON
}
