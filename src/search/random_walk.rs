//! `RandomWalk`: for each applicable first action, `k` independent
//! rollouts sampling the probabilistic CPFs to the horizon, averaged
//! and normalized by steps-to-go.
//!
//! THTS otherwise requires single-threaded search driven off one
//! shared PRNG stream, but independent rollouts from independent
//! actions have no shared state to race on, so this is the one engine
//! in the corpus that fans them out with rayon; each rollout gets its
//! own seeded RNG rather than sharing the global stream, trading
//! strict reproduction of a specific seed's trial-by-trial trace for
//! the coarser guarantee that the same task and seed always explore
//! the same rollouts.

use super::engine::{EngineContext, SearchEngine};
use crate::state::State;
use crate::Reward;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

pub struct RandomWalk {
    rollouts: usize,
    seed: u64,
}

impl RandomWalk {
    pub fn new(rollouts: usize, seed: u64) -> Self {
        Self { rollouts, seed }
    }

    fn rollout(&self, ctx: &EngineContext, state: &State, first_action: usize, rollout_index: usize) -> Reward {
        let mut rng = SmallRng::seed_from_u64(self.seed ^ (first_action as u64).wrapping_mul(0x9E3779B97F4A7C15) ^ rollout_index as u64);
        let horizon = state.steps_to_go().max(1);
        let mut current = state.clone();
        let mut action_index = first_action;
        let mut discounted = 0.0;
        let mut discount = 1.0;
        while current.steps_to_go() > 0 {
            let action = &ctx.task.action_states[action_index];
            discounted += discount * ctx.task.reward(&current, action);
            discount *= ctx.task.discount;
            current = ctx.task.calc_successor_state(&current, action, &mut rng);
            if current.steps_to_go() == 0 {
                break;
            }
            let applicable = ctx.task.applicable_actions(&current, false);
            let candidates: Vec<usize> = applicable.iter().enumerate().filter(|(_, &a)| a >= 0).map(|(i, _)| i).collect();
            action_index = candidates[rng.random_range(0..candidates.len())];
        }
        discounted / horizon as f64
    }
}

impl SearchEngine for RandomWalk {
    fn estimate_q_values(&self, ctx: &EngineContext, state: &State, applicable: &[i64]) -> Vec<Reward> {
        applicable
            .iter()
            .enumerate()
            .map(|(i, &a)| {
                if a != i as i64 {
                    return Reward::NEG_INFINITY;
                }
                let total: f64 = (0..self.rollouts).into_par_iter().map(|k| self.rollout(ctx, state, i, k)).sum();
                total / self.rollouts.max(1) as f64
            })
            .collect()
    }

    fn uses_determinized_task(&self) -> bool {
        false
    }
}
