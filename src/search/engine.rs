//! The search engine interface: the common contract every simple
//! engine and every THTS sub-engine (used by the initializer) is
//! driven through.

use crate::lock::RewardLockTable;
use crate::task::Task;
use crate::Reward;

/// the borrowed context every engine call runs against: the task it
/// plans over and the process-wide reward-lock memo.
pub struct EngineContext<'a> {
    pub task: &'a Task,
    pub locks: &'a RewardLockTable,
}

/// a search engine exposes at least one of three estimators. Every
/// default here is expressed in terms of `estimate_q_values`, so an
/// implementation that only overrides that one method is already a
/// complete engine; engines that find one of the other forms more
/// natural (e.g. a pure state-value heuristic) can override the
/// corresponding method directly.
pub trait SearchEngine {
    /// one entry per action in `applicable`'s index space; `-inf` for
    /// entries whose `applicable[i] < 0`.
    fn estimate_q_values(&self, ctx: &EngineContext, state: &crate::state::State, applicable: &[i64]) -> Vec<Reward>;

    fn estimate_best_actions(&self, ctx: &EngineContext, state: &crate::state::State, applicable: &[i64]) -> Vec<usize> {
        let q = self.estimate_q_values(ctx, state, applicable);
        let best = q.iter().cloned().fold(Reward::NEG_INFINITY, Reward::max);
        q.iter()
            .enumerate()
            .filter(|(_, &v)| (v - best).abs() < crate::EPSILON)
            .map(|(i, _)| i)
            .collect()
    }

    fn estimate_state_value(&self, ctx: &EngineContext, state: &crate::state::State, applicable: &[i64]) -> Reward {
        self.estimate_q_values(ctx, state, applicable)
            .into_iter()
            .fold(Reward::NEG_INFINITY, Reward::max)
    }

    fn uses_determinized_task(&self) -> bool {
        true
    }

    fn caches(&self) -> bool {
        false
    }

    fn uses_reward_lock_detection(&self) -> bool {
        false
    }

    fn max_search_depth(&self) -> u32 {
        u32::MAX
    }

    /// disabling caching must cascade to every sub-engine a composite
    /// engine owns; the default is a no-op for leaf engines that never
    /// cached to begin with.
    fn disable_caching(&mut self) {}
}
