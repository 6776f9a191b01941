//! Backup functions: how a trial's sampled return is folded back into
//! the ancestors it passed through.
//!
//! Chance nodes store the action's immediate reward in
//! `common.immediate_reward` (fixed once, at allocation) and the
//! discounted expected value of the successor decision node in
//! `common.future_reward`, so `expected_reward_estimate()` is exactly
//! the node's current Q(s,a) estimate. Decision nodes leave
//! `immediate_reward` at zero and hold their V(s) estimate in
//! `future_reward`.

use super::node::{NodeArena, NodeId};
use crate::Reward;

pub trait BackupFunction: Send + Sync {
    /// a trial just sampled an outcome of `chance` that bottomed out at
    /// a successor decision node with current estimate `child_v`.
    fn backup_chance(&self, arena: &mut NodeArena, chance: NodeId, discount: f64, child_v: Reward);

    /// a trial just visited `decision` via `visited_action`, whose
    /// chance child was just updated by `backup_chance`.
    fn backup_decision(&self, arena: &mut NodeArena, decision: NodeId, visited_action: usize, applicable: &[i64]);
}

/// running-average update shared by MC-backup and MaxMC/PB's
/// chance-node half: only the decision-node rule differs between the
/// three.
fn running_average_chance(arena: &mut NodeArena, chance: NodeId, discount: f64, child_v: Reward) {
    let node = arena.get_mut(chance).as_chance_mut();
    node.common.visits += 1;
    let n = node.common.visits as f64;
    let target = discount * child_v;
    node.common.future_reward += (target - node.common.future_reward) / n;
}

fn running_average_decision(arena: &mut NodeArena, decision: NodeId, visited_action: usize) {
    let q = {
        let d = arena.get(decision).as_decision();
        d.common.children[visited_action].map(|c| arena.get(c).common().expected_reward_estimate())
    };
    let Some(q) = q else { return };
    let d = arena.get_mut(decision).as_decision_mut();
    d.common.visits += 1;
    let n = d.common.visits as f64;
    d.common.future_reward += (q - d.common.future_reward) / n;
}

/// max over every applicable action's currently-allocated chance child,
/// plus whether all of them are already solved.
fn max_over_children(arena: &NodeArena, decision: NodeId, applicable: &[i64]) -> Option<(Reward, bool)> {
    let d = arena.get(decision).as_decision();
    let mut best = Reward::NEG_INFINITY;
    let mut any = false;
    let mut all_solved = true;
    for a in 0..applicable.len() {
        if applicable[a] < 0 {
            continue;
        }
        match d.common.children[a] {
            Some(child) => {
                any = true;
                let c = arena.get(child).common();
                best = best.max(c.expected_reward_estimate());
                all_solved &= c.solved;
            }
            None => all_solved = false,
        }
    }
    any.then_some((best, all_solved))
}

/// "Leaf": visits are counted but the node's initial heuristic estimate
/// is never revised — used when the leaf initializer's estimate is
/// trusted outright (e.g. an admissible [`crate::search::UniformEvaluation`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct LeafBackup;

impl BackupFunction for LeafBackup {
    fn backup_chance(&self, arena: &mut NodeArena, chance: NodeId, _discount: f64, _child_v: Reward) {
        arena.get_mut(chance).common_mut().visits += 1;
    }

    fn backup_decision(&self, arena: &mut NodeArena, decision: NodeId, _visited_action: usize, _applicable: &[i64]) {
        arena.get_mut(decision).common_mut().visits += 1;
    }
}

/// "MC-backup": running average of discounted returns at both node
/// kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonteCarloBackup;

impl BackupFunction for MonteCarloBackup {
    fn backup_chance(&self, arena: &mut NodeArena, chance: NodeId, discount: f64, child_v: Reward) {
        running_average_chance(arena, chance, discount, child_v);
    }

    fn backup_decision(&self, arena: &mut NodeArena, decision: NodeId, visited_action: usize, _applicable: &[i64]) {
        running_average_decision(arena, decision, visited_action);
    }
}

/// "MaxMC-backup": decision nodes take the max over their
/// currently-allocated action children's Q-estimate rather than an
/// average over return samples; chance nodes still average.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxMonteCarloBackup;

impl BackupFunction for MaxMonteCarloBackup {
    fn backup_chance(&self, arena: &mut NodeArena, chance: NodeId, discount: f64, child_v: Reward) {
        running_average_chance(arena, chance, discount, child_v);
    }

    fn backup_decision(&self, arena: &mut NodeArena, decision: NodeId, _visited_action: usize, applicable: &[i64]) {
        if let Some((best, _)) = max_over_children(arena, decision, applicable) {
            let d = arena.get_mut(decision).as_decision_mut();
            d.common.visits += 1;
            d.common.future_reward = best;
        }
    }
}

/// steps-to-go at or below this count are "deep" enough for the backup
/// lock to engage; nodes further from the horizon keep recomputing
/// every trial since they still have more of the tree below them to
/// hear from.
const BACKUP_LOCK_DEPTH: u32 = 4;

/// consecutive stable recomputations (so three identical values across
/// three trials) required to engage the backup lock.
const BACKUP_LOCK_REPEATS: u32 = 2;

/// "Partial-Bellman backup with backup-lock": decision nodes take a
/// true max over every applicable action's current Q-estimate and are
/// marked solved once every applicable action has an allocated, solved
/// chance child. Chance nodes take the probability-weighted mean of
/// their sampled outcomes' Q-estimates, and additionally carry a
/// *backup lock*: once a chance node below [`BACKUP_LOCK_DEPTH`] has
/// recomputed the same future-reward estimate [`BACKUP_LOCK_REPEATS`]
/// times in a row, further backups through it are skipped until its
/// support changes (a new outcome gets sampled), which releases it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartialBellmanBackup;

impl BackupFunction for PartialBellmanBackup {
    fn backup_chance(&self, arena: &mut NodeArena, chance: NodeId, discount: f64, _child_v: Reward) {
        let live_support = arena.get(chance).as_chance().outcomes.len();
        let locked = arena.get(chance).common().backup_locked;
        if locked {
            let snapshot = arena.get(chance).as_chance().locked_support_size;
            if snapshot == Some(live_support) {
                arena.get_mut(chance).common_mut().visits += 1;
                return;
            }
            // the subtree changed (a fresh outcome was sampled): release the lock.
            let node = arena.get_mut(chance).common_mut();
            node.backup_locked = false;
            node.lock_streak = 0;
        }
        if arena.get(chance).common().solved {
            arena.get_mut(chance).common_mut().visits += 1;
            return;
        }

        let (weighted, weight, solved_mass) = {
            let c = arena.get(chance).as_chance();
            c.outcomes.iter().fold((0.0, 0.0, 0.0), |(w_sum, w, solved), &(_, id)| {
                let child = arena.get(id).common();
                (w_sum + child.prob * child.expected_reward_estimate(), w + child.prob, solved + if child.solved { child.prob } else { 0.0 })
            })
        };

        let node = arena.get_mut(chance).common_mut();
        node.visits += 1;
        let previous = node.future_reward;
        if weight > 0.0 {
            node.future_reward = discount * weighted / weight;
        }
        node.solved = weight > 0.0 && (solved_mass - weight).abs() < crate::EPSILON;

        let stable = (node.future_reward - previous).abs() < crate::EPSILON;
        if stable && node.steps_to_go <= BACKUP_LOCK_DEPTH {
            node.lock_streak += 1;
        } else {
            node.lock_streak = 0;
        }
        if node.lock_streak >= BACKUP_LOCK_REPEATS {
            node.backup_locked = true;
            arena.get_mut(chance).as_chance_mut().locked_support_size = Some(live_support);
        }
    }

    fn backup_decision(&self, arena: &mut NodeArena, decision: NodeId, _visited_action: usize, applicable: &[i64]) {
        if arena.get(decision).common().solved {
            // every child proven solved: value is fixed, skip propagation.
            arena.get_mut(decision).common_mut().visits += 1;
            return;
        }
        if let Some((best, all_solved)) = max_over_children(arena, decision, applicable) {
            let d = arena.get_mut(decision).as_decision_mut();
            d.common.visits += 1;
            d.common.future_reward = best;
            d.common.solved = all_solved;
        }
    }
}
