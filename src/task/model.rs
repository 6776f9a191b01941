//! The Task model: the immutable-after-load description of one
//! planning problem, plus the operations a search engine drives it
//! through.

use super::fluent::ActionState;
use crate::error::TaskError;
use crate::eval::{Evaluatable, EvaluatableKind};
use crate::logic::{Env, ExprArena, KleeneEnv};
use crate::state::kleene::ValueSet;
use crate::state::{HashParams, PDSlot, PDState, State};
use crate::{HashKey, Reward, Value};
use std::collections::HashMap;
use std::sync::Mutex;

/// "final-reward calculation" token: how the task resolves the value
/// of the state once the horizon is reached mid-trial.
#[derive(Debug, Clone)]
pub enum FinalRewardPolicy {
    Noop,
    FirstApplicable,
    BestOfCandidateSet(Vec<usize>),
}

/// an immutable-after-load planning problem.
#[derive(Debug)]
pub struct Task {
    pub name: String,
    pub horizon: u32,
    pub discount: f64,
    pub initial_state: State,
    pub hash_params: HashParams,
    pub arena: ExprArena,

    pub num_action_fluents: usize,
    pub non_fluents: Vec<Value>,

    /// deterministic-before-probabilistic order.
    pub cpfs: Vec<Evaluatable>,
    pub reward: Evaluatable,
    pub preconditions: Vec<Evaluatable>,
    pub action_states: Vec<ActionState>,

    pub final_reward_policy: FinalRewardPolicy,
    pub reward_lock_detection: bool,
    pub goal_test_action: usize,

    /// cached by state identity, append-only, shared by the whole task.
    applicability_cache: Mutex<HashMap<HashKey, Vec<i64>>>,
}

impl Task {
    pub fn new(
        name: String,
        horizon: u32,
        discount: f64,
        initial_state: State,
        hash_params: HashParams,
        arena: ExprArena,
        num_action_fluents: usize,
        non_fluents: Vec<Value>,
        cpfs: Vec<Evaluatable>,
        reward: Evaluatable,
        preconditions: Vec<Evaluatable>,
        action_states: Vec<ActionState>,
        final_reward_policy: FinalRewardPolicy,
        reward_lock_detection: bool,
        goal_test_action: usize,
    ) -> Result<Self, TaskError> {
        if !matches!(reward.kind, EvaluatableKind::Reward { .. }) {
            return Err(TaskError::MalformedSection {
                section: "reward".into(),
                reason: "reward evaluatable must carry EvaluatableKind::Reward".into(),
            });
        }
        Ok(Self {
            name,
            horizon,
            discount,
            initial_state,
            hash_params,
            arena,
            num_action_fluents,
            non_fluents,
            cpfs,
            reward,
            preconditions,
            action_states,
            final_reward_policy,
            reward_lock_detection,
            goal_test_action,
            applicability_cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn reward_range(&self) -> (Reward, Reward) {
        match self.reward.kind {
            EvaluatableKind::Reward { min, max, .. } => (min, max),
            _ => unreachable!("constructor enforces reward kind"),
        }
    }

    pub fn reward_is_action_independent(&self) -> bool {
        matches!(
            self.reward.kind,
            EvaluatableKind::Reward {
                action_independent: true,
                ..
            }
        )
    }

    fn env<'a>(&'a self, state: &'a State, action: &'a ActionState) -> Env<'a> {
        Env {
            state: state.values(),
            action: &action.values,
            non_fluents: &self.non_fluents,
        }
    }

    /// `reward(state, action) -> double`.
    pub fn reward(&self, state: &State, action: &ActionState) -> Reward {
        let env = self.env(state, action);
        self.reward.evaluate(&self.arena, &env)
    }

    /// `sample_successor`: evaluate every CPF under `evaluate_pd`;
    /// fully-resolved (single-value) distributions collapse to Dirac
    /// slots in place.
    pub fn sample_successor(&self, state: &State, action: &ActionState) -> PDState {
        let env = self.env(state, action);
        let slots = self
            .cpfs
            .iter()
            .map(|cpf| {
                let pd = cpf.evaluate_pd(&self.arena, &env, state, action.index);
                if pd.is_dirac() {
                    PDSlot::Dirac(pd.values()[0])
                } else {
                    PDSlot::Dist(pd)
                }
            })
            .collect();
        PDState::new(slots, state.steps_to_go().saturating_sub(1))
    }

    /// `calc_successor_state`: sample a concrete successor, drawing from
    /// the shared PRNG stream (determinism).
    pub fn calc_successor_state(&self, state: &State, action: &ActionState, rng: &mut impl rand::Rng) -> State {
        self.sample_successor(state, action).sample(rng, &self.hash_params)
    }

    /// `calc_state_transition_deterministic`: evaluate the determinized
    /// CPFs and determinized reward. Used by DFS/IDS/MinimalLookahead,
    /// and by applicability/duplicate-action detection, which must stay
    /// deterministic to be reproducible.
    pub fn calc_state_transition_deterministic(&self, state: &State, action: &ActionState) -> (State, Reward) {
        let env = self.env(state, action);
        let values: Vec<Value> = self.cpfs.iter().map(|cpf| cpf.evaluate(&self.arena, &env)).collect();
        let next = state.successor(values, &self.hash_params);
        let reward = self.reward(state, action);
        (next, reward)
    }

    /// `applicable_actions`: entry `i` is `i` (applicable, reasonable),
    /// `-1` (precondition violated), or `j<i` (duplicate of `j` under
    /// the determinization). Cached by state identity.
    pub fn applicable_actions(&self, state: &State, check_reasonability: bool) -> Vec<i64> {
        if state.hash_key() != crate::HASH_DISABLED {
            if let Some(cached) = self.applicability_cache.lock().expect("applicability cache poisoned").get(&state.hash_key()) {
                return cached.clone();
            }
        }
        let mut result = vec![-1i64; self.action_states.len()];
        let mut determinized: Vec<Option<State>> = Vec::with_capacity(self.action_states.len());
        for (i, action) in self.action_states.iter().enumerate() {
            if !self.satisfies_preconditions(state, action) {
                determinized.push(None);
                continue;
            }
            let (successor, _) = self.calc_state_transition_deterministic(state, action);
            if check_reasonability {
                if let Some(j) = determinized.iter().enumerate().find_map(|(j, prior)| {
                    prior.as_ref().filter(|p| p.values() == successor.values()).map(|_| j)
                }) {
                    result[i] = j as i64;
                    determinized.push(Some(successor));
                    continue;
                }
            }
            result[i] = i as i64;
            determinized.push(Some(successor));
        }
        if state.hash_key() != crate::HASH_DISABLED {
            self.applicability_cache.lock().expect("applicability cache poisoned").insert(state.hash_key(), result.clone());
        }
        result
    }

    fn satisfies_preconditions(&self, state: &State, action: &ActionState) -> bool {
        let env = self.env(state, action);
        action
            .relevant_preconditions
            .iter()
            .all(|&p| self.preconditions[p].evaluate(&self.arena, &env) != 0.0)
    }

    /// `optimal_final_action`.
    pub fn optimal_final_action(&self, state: &State) -> usize {
        let applicable = self.applicable_actions(state, false);
        match &self.final_reward_policy {
            FinalRewardPolicy::Noop => 0,
            FinalRewardPolicy::FirstApplicable => applicable
                .iter()
                .position(|&a| a >= 0)
                .unwrap_or(0),
            FinalRewardPolicy::BestOfCandidateSet(candidates) => candidates
                .iter()
                .filter(|&&c| applicable.get(c).copied().unwrap_or(-1) >= 0)
                .max_by(|&&a, &&b| {
                    let ra = self.reward(state, &self.action_states[a]);
                    let rb = self.reward(state, &self.action_states[b]);
                    ra.partial_cmp(&rb).expect("reward is never NaN")
                })
                .copied()
                .unwrap_or(0),
        }
    }

    /// `optimal_final_reward`.
    pub fn optimal_final_reward(&self, state: &State) -> Reward {
        let action = &self.action_states[self.optimal_final_action(state)];
        self.reward(state, action)
    }

    fn kleene_env<'a>(&'a self, state: &'a [ValueSet], action: &'a ActionState) -> KleeneEnv<'a> {
        KleeneEnv {
            state,
            action: &action.values,
            non_fluents: &self.non_fluents,
        }
    }

    /// the Kleene-evaluated reward for a Kleene state under one action,
    /// used by reward-lock detection.
    pub fn kleene_reward(&self, state: &[ValueSet], action: &ActionState) -> ValueSet {
        let env = self.kleene_env(state, action);
        self.arena.evaluate_kleene(self.reward.original, &env)
    }

    /// the Kleene-evaluated successor of every state-fluent slot under
    /// one action (the task's Kleene-wise successor union).
    pub fn kleene_successor(&self, state: &[ValueSet], action: &ActionState) -> Vec<ValueSet> {
        let env = self.kleene_env(state, action);
        self.cpfs.iter().map(|cpf| self.arena.evaluate_kleene(cpf.original, &env)).collect()
    }
}
