//! `DFS`: exhaustive search on the determinized task, memoizing state
//! values keyed by state hash alone — sound because
//! [`crate::state::hashkeys::HashParams::calc_state_hash_key`] never
//! folds steps-to-go into the key, so the determinized task really is
//! stationary at the hash-key level the memo uses.

use super::engine::{EngineContext, SearchEngine};
use crate::state::State;
use crate::{HashKey, Reward};
use std::sync::Mutex;

pub struct Dfs {
    memo: Mutex<std::collections::HashMap<HashKey, Reward>>,
    caching: bool,
}

impl Dfs {
    pub fn new(caching: bool) -> Self {
        Self {
            memo: Mutex::new(std::collections::HashMap::new()),
            caching,
        }
    }

    fn value(&self, ctx: &EngineContext, state: &State) -> Reward {
        if state.steps_to_go() == 0 {
            return 0.0;
        }
        let key = state.hash_key();
        if self.caching && key != crate::HASH_DISABLED {
            if let Some(&v) = self.memo.lock().expect("DFS memo poisoned").get(&key) {
                return v;
            }
        }
        let applicable = ctx.task.applicable_actions(state, true);
        let mut best = Reward::NEG_INFINITY;
        for (a, &entry) in applicable.iter().enumerate() {
            if entry < 0 || entry as usize != a {
                continue; // inapplicable, or a duplicate of an earlier action
            }
            let (successor, reward) = ctx.task.calc_state_transition_deterministic(state, &ctx.task.action_states[a]);
            let future = reward + ctx.task.discount * self.value(ctx, &successor);
            best = best.max(future);
        }
        if best == Reward::NEG_INFINITY {
            best = ctx.task.optimal_final_reward(state);
        }
        if self.caching && key != crate::HASH_DISABLED {
            self.memo.lock().expect("DFS memo poisoned").insert(key, best);
        }
        best
    }
}

impl SearchEngine for Dfs {
    fn estimate_q_values(&self, ctx: &EngineContext, state: &State, applicable: &[i64]) -> Vec<Reward> {
        applicable
            .iter()
            .enumerate()
            .map(|(a, &entry)| {
                if entry < 0 {
                    return Reward::NEG_INFINITY;
                }
                let (successor, reward) = ctx.task.calc_state_transition_deterministic(state, &ctx.task.action_states[a]);
                reward + ctx.task.discount * self.value(ctx, &successor)
            })
            .collect()
    }

    fn caches(&self) -> bool {
        self.caching
    }

    fn disable_caching(&mut self) {
        self.caching = false;
    }
}
