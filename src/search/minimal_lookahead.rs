//! `MinimalLookahead`: one-step lookahead on the determinized task.

use super::engine::{EngineContext, SearchEngine};
use crate::state::State;
use crate::Reward;

pub struct MinimalLookahead;

impl SearchEngine for MinimalLookahead {
    fn estimate_q_values(&self, ctx: &EngineContext, state: &State, applicable: &[i64]) -> Vec<Reward> {
        let noop_applicable = applicable.first().copied().unwrap_or(-1) == 0;
        let preconditions_trivial = ctx.task.preconditions.is_empty();
        applicable
            .iter()
            .enumerate()
            .map(|(a, &entry)| {
                if entry < 0 {
                    return Reward::NEG_INFINITY;
                }
                let action = &ctx.task.action_states[a];
                let (successor, r_sa) = ctx.task.calc_state_transition_deterministic(state, action);
                if ctx.task.reward_is_action_independent() {
                    // "(r(s) + r(s'_a)) / 2" — any action stands in
                    // for `r(s)` when the reward never reads the
                    // action, so noop is the natural reference point.
                    let noop = &ctx.task.action_states[0];
                    let r_s = ctx.task.reward(state, noop);
                    let r_succ = ctx.task.reward(&successor, noop);
                    (r_s + r_succ) / 2.0
                } else if noop_applicable && preconditions_trivial {
                    let noop = &ctx.task.action_states[0];
                    let r_succ_noop = ctx.task.reward(&successor, noop);
                    (r_sa + r_succ_noop) / 2.0
                } else {
                    r_sa
                }
            })
            .collect()
    }

    fn max_search_depth(&self) -> u32 {
        1
    }
}
