//! Root recommendation: once the trial budget is spent, pick the action
//! to actually execute.

use super::node::{NodeArena, NodeId};
use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub enum Recommendation {
    /// argmax over each visited action's current Q-estimate.
    ExpectedBestArm,
    /// argmax over each visited action's visit count, breaking ties by
    /// Q-estimate.
    MostPlayedArm,
}

impl Recommendation {
    pub fn recommend(&self, arena: &NodeArena, root: NodeId, applicable: &[i64], rng: &mut dyn rand::RngCore) -> usize {
        let d = arena.get(root).as_decision();
        let candidates: Vec<usize> = (0..applicable.len())
            .filter(|&a| applicable[a] >= 0 && d.common.children[a].is_some())
            .collect();
        if candidates.is_empty() {
            // Contradictory configuration (e.g. the trial budget ran out before the
            // root ever expanded a child): fall back to a uniform pick over the
            // applicable actions themselves rather than panicking.
            let fallback: Vec<usize> = (0..applicable.len()).filter(|&a| applicable[a] >= 0).collect();
            return if fallback.is_empty() { 0 } else { fallback[rng.random_range(0..fallback.len())] };
        }
        match self {
            Recommendation::ExpectedBestArm => *candidates
                .iter()
                .max_by(|&&a, &&b| q(arena, d, a).partial_cmp(&q(arena, d, b)).expect("reward is never NaN"))
                .expect("non-empty candidates"),
            Recommendation::MostPlayedArm => *candidates
                .iter()
                .max_by(|&&a, &&b| {
                    let va = visits(arena, d, a);
                    let vb = visits(arena, d, b);
                    va.cmp(&vb).then_with(|| q(arena, d, a).partial_cmp(&q(arena, d, b)).expect("reward is never NaN"))
                })
                .expect("non-empty candidates"),
        }
    }
}

fn q(arena: &NodeArena, d: &super::node::DecisionNode, a: usize) -> f64 {
    d.common.children[a].map(|c| arena.get(c).common().expected_reward_estimate()).unwrap_or(f64::NEG_INFINITY)
}

fn visits(arena: &NodeArena, d: &super::node::DecisionNode, a: usize) -> u32 {
    d.common.children[a].map(|c| arena.get(c).common().visits).unwrap_or(0)
}
