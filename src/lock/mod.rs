//! Reward-lock detection: Kleene fixed-point reasoning that proves a
//! state is a dead end (every action yields the task's minimum reward,
//! forever) or a goal (the goal-test action yields the task's maximum
//! reward, forever), with memoization of proven locks.
//!
//! The memo tables stand in for "two BDDs keyed by state". No crate in
//! reach of this codebase's dependency stack supplies a BDD package,
//! and a BDD's compactness buys nothing a search engine needs here:
//! lookups are by exact Kleene-state identity, never by boolean formula
//! equivalence. A hash-keyed memo table gives the same monotone,
//! append-only, checked-before-recompute membership test, so that is
//! what this module uses in place of a literal BDD.

use crate::state::kleene::ValueSet;
use crate::task::{ActionState, Task};
use crate::HashKey;
use std::collections::HashSet;
use std::sync::Mutex;

/// process-wide, append-only memo of proven reward locks, keyed by
/// Kleene state hash.
#[derive(Debug, Default)]
pub struct RewardLockTable {
    dead_ends: Mutex<HashSet<HashKey>>,
    goals: Mutex<HashSet<HashKey>>,
}

/// bound on fixed-point iterations; termination follows from a finite,
/// monotone lattice, but a cap keeps a malformed task from looping
/// forever on an unreachable fixed point.
const MAX_ITERATIONS: usize = 10_000;

impl RewardLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_known_dead_end(&self, key: HashKey) -> bool {
        key != crate::HASH_DISABLED && self.dead_ends.lock().expect("dead-end table poisoned").contains(&key)
    }

    pub fn is_known_goal(&self, key: HashKey) -> bool {
        key != crate::HASH_DISABLED && self.goals.lock().expect("goal table poisoned").contains(&key)
    }

    fn record_dead_end(&self, key: HashKey) {
        if key != crate::HASH_DISABLED {
            self.dead_ends.lock().expect("dead-end table poisoned").insert(key);
        }
    }

    fn record_goal(&self, key: HashKey) {
        if key != crate::HASH_DISABLED {
            self.goals.lock().expect("goal table poisoned").insert(key);
        }
    }

    /// "dead end": evaluate noop; if its reward is not the task minimum
    /// in Kleene semantics, fail immediately. Otherwise union the
    /// Kleene-wise successors of every action that preserves minimum
    /// reward and iterate to a fixed point.
    pub fn is_dead_end(&self, task: &Task, key: HashKey, state: &[ValueSet]) -> bool {
        if self.is_known_dead_end(key) {
            return true;
        }
        let (min, _) = task.reward_range();
        let noop = &task.action_states[0];
        if !reward_is_exactly(task.kleene_reward(state, noop), min) {
            return false;
        }
        let mut frontier = state.to_vec();
        for _ in 0..MAX_ITERATIONS {
            let mut union = frontier.clone();
            let mut changed = false;
            for action in &task.action_states {
                if !reward_is_exactly(task.kleene_reward(&frontier, action), min) {
                    // this action can escape the minimum; only actions
                    // that preserve it are folded into the union.
                    continue;
                }
                let successor = task.kleene_successor(&frontier, action);
                for (slot, next) in union.iter_mut().zip(successor.iter()) {
                    let before = slot.len();
                    slot.extend(next.iter().cloned());
                    if slot.len() != before {
                        changed = true;
                    }
                }
            }
            if !changed {
                self.record_dead_end(key);
                return true;
            }
            frontier = union;
        }
        false
    }

    /// "goal": apply the goal-test action in Kleene semantics; if its
    /// reward is not the singleton task maximum, fail. Otherwise join
    /// parent and successor and recurse to a fixed point.
    pub fn is_goal(&self, task: &Task, key: HashKey, state: &[ValueSet]) -> bool {
        if self.is_known_goal(key) {
            return true;
        }
        let (_, max) = task.reward_range();
        let goal_action = &task.action_states[task.goal_test_action];
        if !reward_is_exactly(task.kleene_reward(state, goal_action), max) {
            return false;
        }
        let mut frontier = state.to_vec();
        for _ in 0..MAX_ITERATIONS {
            let successor = task.kleene_successor(&frontier, goal_action);
            let mut joined = frontier.clone();
            let mut changed = false;
            for (slot, next) in joined.iter_mut().zip(successor.iter()) {
                let before = slot.len();
                slot.extend(next.iter().cloned());
                if slot.len() != before {
                    changed = true;
                }
            }
            if !reward_is_exactly(task.kleene_reward(&joined, goal_action), max) {
                return false;
            }
            if !changed {
                self.record_goal(key);
                return true;
            }
            frontier = joined;
        }
        false
    }
}

/// is this Kleene reward set exactly the singleton `{target}`? Used
/// wherever a dead end or goal needs "the Kleene reward is [not] the
/// singleton max/min".
fn reward_is_exactly(reward: ValueSet, target: f64) -> bool {
    reward.len() == 1 && crate::state::kleene::values_of(&reward).all(|v| (v - target).abs() < crate::EPSILON)
}

/// convenience used by the action-taking caller (not the reward-lock
/// fixed point itself, which never calls this): turn a noop-only reward
/// lock into a terminal reward — `reward(state, noop) × steps_to_go` as
/// a leaf backup.
pub fn dead_end_terminal_value(task: &Task, state: &crate::state::State) -> crate::Reward {
    let (min, _) = task.reward_range();
    min * state.steps_to_go() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{CachePolicy, Evaluatable, EvaluatableKind};
    use crate::logic::{Expr, ExprArena};
    use crate::state::kleene::{singleton, KleeneState};
    use crate::state::{HashParams, State};
    use crate::task::FinalRewardPolicy;

    /// a single fluent stuck at 0 forever, reward always equal to the
    /// task minimum: the canonical dead end.
    fn dead_end_task() -> Task {
        let mut arena = ExprArena::new();
        let s = arena.push(Expr::StateFluent(0));
        let cpf_expr = s; // identity CPF: s stays whatever it is
        let reward_expr = arena.constant(0.0);
        let params = HashParams::disabled(1, 2);
        let initial = State::make(vec![0.0], 5, &params);
        let cpf = Evaluatable::new(0, EvaluatableKind::Cpf { head_fluent: 0, domain_size: 1 }, cpf_expr, cpf_expr, vec![0], CachePolicy::None, 0);
        let reward = Evaluatable::new(
            1,
            EvaluatableKind::Reward { min: 0.0, max: 1.0, action_independent: true },
            reward_expr,
            reward_expr,
            vec![0],
            CachePolicy::None,
            0,
        );
        Task::new(
            "dead-end".into(),
            5,
            1.0,
            initial,
            params,
            arena,
            0,
            Vec::new(),
            vec![cpf],
            reward,
            Vec::new(),
            vec![ActionState::noop(0)],
            FinalRewardPolicy::Noop,
            true,
            0,
        )
        .unwrap()
    }

    #[test]
    fn stuck_zero_reward_state_is_a_dead_end() {
        let task = dead_end_task();
        let table = RewardLockTable::new();
        let kleene_state = KleeneState::from_state(&task.initial_state);
        let slots: Vec<ValueSet> = kleene_state.slots().iter().map(|slot| slot.values().map(crate::state::kleene::ValueKey).collect()).collect();
        assert!(table.is_dead_end(&task, task.initial_state.hash_key(), &slots));
        assert!(table.is_known_dead_end(task.initial_state.hash_key()) || task.initial_state.hash_key() == crate::HASH_DISABLED);
    }

    #[test]
    fn non_minimal_reward_is_not_a_dead_end() {
        let mut arena = ExprArena::new();
        let s = arena.push(Expr::StateFluent(0));
        let reward_expr = s;
        let params = HashParams::disabled(1, 2);
        let initial = State::make(vec![1.0], 5, &params);
        let cpf = Evaluatable::new(0, EvaluatableKind::Cpf { head_fluent: 0, domain_size: 2 }, s, s, vec![0], CachePolicy::None, 0);
        let reward = Evaluatable::new(
            1,
            EvaluatableKind::Reward { min: 0.0, max: 1.0, action_independent: true },
            reward_expr,
            reward_expr,
            vec![0],
            CachePolicy::None,
            0,
        );
        let task = Task::new(
            "not-dead-end".into(),
            5,
            1.0,
            initial,
            params,
            arena,
            0,
            Vec::new(),
            vec![cpf],
            reward,
            Vec::new(),
            vec![ActionState::noop(0)],
            FinalRewardPolicy::Noop,
            true,
            0,
        )
        .unwrap();
        let table = RewardLockTable::new();
        let slots = vec![singleton(1.0)];
        assert!(!table.is_dead_end(&task, task.initial_state.hash_key(), &slots));
    }
}
