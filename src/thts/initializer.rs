//! The leaf initializer ingredient ("ExpandNode"): when a trial
//! reaches a state it has no node for yet, query a [`SearchEngine`]
//! sub-engine for a Q-value seed per applicable action, and count the
//! heuristic as the leaf's first (virtual) visit so later trial backups
//! blend real samples in rather than overwrite the seed outright.

use crate::search::{EngineContext, SearchEngine};
use crate::state::State;
use crate::Reward;

pub trait Initializer: Send + Sync {
    fn initialize(&self, ctx: &EngineContext, state: &State, applicable: &[i64]) -> Vec<Reward>;
}

pub struct ExpandNode {
    engine: Box<dyn SearchEngine + Send + Sync>,
    /// scales the sub-engine's Q-value seed by `heuristic_weight *
    /// steps_to_go` before it becomes a leaf's future-reward estimate,
    /// so engines that already report a per-step average (like
    /// `RandomWalk`) and engines that report a raw total (like an
    /// admissible `UniformEvaluation`) can both seed a leaf correctly.
    heuristic_weight: f64,
}

impl ExpandNode {
    pub fn new(engine: Box<dyn SearchEngine + Send + Sync>) -> Self {
        Self { engine, heuristic_weight: 1.0 }
    }

    pub fn with_heuristic_weight(mut self, weight: f64) -> Self {
        self.heuristic_weight = weight;
        self
    }
}

impl Initializer for ExpandNode {
    fn initialize(&self, ctx: &EngineContext, state: &State, applicable: &[i64]) -> Vec<Reward> {
        let scale = self.heuristic_weight * state.steps_to_go() as f64;
        self.engine
            .estimate_q_values(ctx, state, applicable)
            .into_iter()
            .map(|q| if q.is_finite() { q * scale } else { q })
            .collect()
    }
}
