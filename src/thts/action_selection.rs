//! Action selection at decision nodes. UCB1 is the only ingredient
//! offered, with an `f ∈ {log, sqrt, identity, log²}` knob over the
//! exploration term, plus the two tie-breaking variants
//! `selectLeastVisitedActionInRoot` and `selectByVisitDifference`.

use super::node::{NodeArena, NodeId};
use rand::Rng;

/// the `f` applied to the parent visit count inside UCB1's exploration
/// term.
#[derive(Debug, Clone, Copy)]
pub enum ExplorationFn {
    Log,
    Sqrt,
    Identity,
    LogSquared,
}

impl ExplorationFn {
    fn apply(&self, n: f64) -> f64 {
        match self {
            ExplorationFn::Log => n.max(1.0).ln(),
            ExplorationFn::Sqrt => n.max(1.0).sqrt(),
            ExplorationFn::Identity => n,
            ExplorationFn::LogSquared => {
                let l = n.max(1.0).ln();
                l * l
            }
        }
    }
}

pub trait ActionSelection: Send + Sync {
    /// choose an index into `applicable` (entries `>= 0`, duplicates
    /// already folded by [`crate::task::Task::applicable_actions`]).
    /// `root` flags whether this decision node is the trial's first,
    /// since UCB1 special-cases it.
    fn select_action(&self, arena: &NodeArena, decision: NodeId, applicable: &[i64], root: bool, rng: &mut dyn rand::RngCore) -> usize;
}

/// the magic constant never drops below this floor, however small the
/// parent's current future-reward estimate is.
const MAGIC_CONSTANT_FLOOR: f64 = 100.0;

/// UCB1: `Q(s,a) + magic_constant * sqrt(f(N(s)) / N(s,a))`, where
/// `magic_constant = max(100, mcs * |parent.future_reward|)` is
/// recomputed from the parent's current estimate on every call, falling
/// back to an unvisited action (least-visited at the root, first
/// unvisited elsewhere) whenever one exists.
#[derive(Debug, Clone, Copy)]
pub struct Ucb1 {
    pub mcs: f64,
    pub exploration: ExplorationFn,
}

impl Ucb1 {
    pub fn new(mcs: f64, exploration: ExplorationFn) -> Self {
        Self { mcs, exploration }
    }
}

impl ActionSelection for Ucb1 {
    fn select_action(&self, arena: &NodeArena, decision: NodeId, applicable: &[i64], root: bool, rng: &mut dyn rand::RngCore) -> usize {
        let node = arena.get(decision).common();
        let candidates: Vec<usize> = (0..applicable.len()).filter(|&a| applicable[a] >= 0).collect();
        debug_assert!(!candidates.is_empty(), "UCB1 called with no applicable action");

        let unvisited: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&a| node.children[a].map(|c| arena.get(c).common().visits == 0).unwrap_or(true))
            .collect();
        if !unvisited.is_empty() {
            // `selectLeastVisitedActionInRoot`: at the root, break ties
            // among zero-visit actions uniformly at random rather than
            // always taking the first, so repeated roots don't bias
            // early exploration order.
            let idx = if root { rng.random_range(0..unvisited.len()) } else { 0 };
            return unvisited[idx];
        }

        let parent_visits = node.visits.max(1) as f64;
        let f_n = self.exploration.apply(parent_visits);
        let magic_constant = (self.mcs * node.future_reward.abs()).max(MAGIC_CONSTANT_FLOOR);
        let mut best = candidates[0];
        let mut best_value = f64::NEG_INFINITY;
        let mut ties = Vec::new();
        for &a in &candidates {
            let child = node.children[a].expect("visited action must have a child");
            let c = arena.get(child).common();
            let visits = c.visits.max(1) as f64;
            let exploitation = c.expected_reward_estimate();
            let exploration = magic_constant * (f_n / visits).sqrt();
            let value = exploitation + exploration;
            if value > best_value + crate::EPSILON {
                best_value = value;
                best = a;
                ties.clear();
                ties.push(a);
            } else if (value - best_value).abs() <= crate::EPSILON {
                ties.push(a);
            }
        }
        if ties.len() > 1 {
            // `selectByVisitDifference`: among value-ties, prefer the
            // least-visited action, breaking further ties at random.
            let min_visits = ties
                .iter()
                .map(|&a| node.children[a].map(|c| arena.get(c).common().visits).unwrap_or(0))
                .min()
                .unwrap_or(0);
            let least_visited: Vec<usize> = ties
                .into_iter()
                .filter(|&a| node.children[a].map(|c| arena.get(c).common().visits).unwrap_or(0) == min_visits)
                .collect();
            best = least_visited[rng.random_range(0..least_visited.len())];
        }
        best
    }
}
