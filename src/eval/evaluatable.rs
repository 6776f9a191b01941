//! The Evaluatable wrapper: a logical expression plus a caching
//! policy, an action hash key map, and (for probabilistic and Kleene
//! evaluation) memoized results keyed by the combined state/action
//! hash key.

use super::cache::{Cache, CachePolicy};
use crate::logic::{Env, ExprArena, ExprId, KleeneEnv};
use crate::state::kleene::ValueSet;
use crate::state::{DiscretePD, State};
use crate::HashKey;
use std::sync::Mutex;

/// what an [`Evaluatable`] represents within the task.
#[derive(Debug, Clone)]
pub enum EvaluatableKind {
    /// a CPF for one state fluent: the fluent's own index and its
    /// declared value domain size, used to size a vector cache.
    Cpf { head_fluent: usize, domain_size: usize },
    /// the reward function: its statically known range and whether it
    /// depends on the action taken at all (`MinimalLookahead` reads
    /// this flag).
    Reward { min: f64, max: f64, action_independent: bool },
    /// one action precondition, evaluated as a boolean guard.
    Precondition,
}

/// a logical expression plus everything the planner needs to evaluate
/// it cheaply and repeatedly. `original` is evaluated under
/// `evaluate_pd`/`evaluate_kleene`; `determinized` is evaluated under
/// `evaluate` for the deterministic search paths
/// (`calc_state_transition_deterministic`). When a CPF's formula is
/// already deterministic, `original == determinized`.
#[derive(Debug)]
pub struct Evaluatable {
    pub index: usize,
    pub kind: EvaluatableKind,
    pub original: ExprId,
    pub determinized: ExprId,
    /// `action_hash_contrib[a]` is added to `state.fluent_hash_key(index)`
    /// to form the full cache key for action `a`.
    action_hash_contrib: Vec<HashKey>,
    pd_cache: Mutex<Cache<DiscretePD>>,
    kleene_cache: Mutex<Cache<ValueSet>>,
}

impl Evaluatable {
    pub fn new(
        index: usize,
        kind: EvaluatableKind,
        original: ExprId,
        determinized: ExprId,
        action_hash_contrib: Vec<HashKey>,
        policy: CachePolicy,
        vector_capacity: usize,
    ) -> Self {
        Self {
            index,
            kind,
            original,
            determinized,
            action_hash_contrib,
            pd_cache: Mutex::new(Cache::new(policy, vector_capacity)),
            kleene_cache: Mutex::new(Cache::new(policy, vector_capacity)),
        }
    }

    fn cache_key(&self, state: &State, action_index: usize) -> HashKey {
        state.fluent_hash_key(self.index) + self.action_hash_contrib.get(action_index).copied().unwrap_or(0)
    }

    /// deterministic evaluation against the determinized formula; not
    /// cached — the deterministic path is already cheap enough to
    /// recompute, and is called from tight rollout loops where a cache
    /// lookup would cost more than the arithmetic.
    pub fn evaluate(&self, arena: &ExprArena, env: &Env) -> f64 {
        arena.evaluate(self.determinized, env)
    }

    /// probabilistic evaluation of the original formula, consulting
    /// and populating the PD cache.
    pub fn evaluate_pd(&self, arena: &ExprArena, env: &Env, state: &State, action_index: usize) -> DiscretePD {
        let key = self.cache_key(state, action_index);
        if let Some(hit) = self.pd_cache.lock().expect("pd cache poisoned").get(key) {
            return hit;
        }
        let value = arena.evaluate_pd(self.original, env);
        self.pd_cache.lock().expect("pd cache poisoned").store(key, value.clone());
        value
    }

    /// Kleene evaluation of the original formula, consulting and
    /// populating the Kleene cache.
    pub fn evaluate_kleene(&self, arena: &ExprArena, env: &KleeneEnv, state: &State, action_index: usize) -> ValueSet {
        let key = self.cache_key(state, action_index);
        if let Some(hit) = self.kleene_cache.lock().expect("kleene cache poisoned").get(key) {
            return hit;
        }
        let value = arena.evaluate_kleene(self.original, env);
        self.kleene_cache.lock().expect("kleene cache poisoned").store(key, value.clone());
        value
    }

    /// the planner's memory watchdog trips: stop growing either cache.
    pub fn disable_caching(&self) {
        self.pd_cache.lock().expect("pd cache poisoned").disable_writes();
        self.kleene_cache.lock().expect("kleene cache poisoned").disable_writes();
    }

    pub fn pd_cache_policy(&self) -> CachePolicy {
        self.pd_cache.lock().expect("pd cache poisoned").policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::Expr;
    use crate::state::HashParams;

    fn test_state() -> (ExprArena, Evaluatable, State) {
        let mut arena = ExprArena::new();
        let p = arena.push(Expr::StateFluent(0));
        let bern = arena.push(Expr::Bernoulli(p));
        let evaluatable = Evaluatable::new(
            0,
            EvaluatableKind::Cpf { head_fluent: 0, domain_size: 2 },
            bern,
            bern,
            vec![0, 0],
            CachePolicy::Map,
            0,
        );
        let params = HashParams::new(vec![vec![0, 1]], vec![vec![(0, 1)]], 1, vec![0], true, false);
        let state = State::make(vec![0.5], 1, &params);
        (arena, evaluatable, state)
    }

    #[test]
    fn pd_cache_hit_returns_identical_distribution_without_recompute() {
        let (arena, evaluatable, state) = test_state();
        let env = Env {
            state: state.values(),
            action: &[],
            non_fluents: &[],
        };
        let first = evaluatable.evaluate_pd(&arena, &env, &state, 0);
        let second = evaluatable.evaluate_pd(&arena, &env, &state, 0);
        assert_eq!(first, second);
        assert_eq!(evaluatable.pd_cache_policy(), CachePolicy::Map);
    }

    #[test]
    fn disable_caching_switches_map_to_disabled_map_but_keeps_prior_entries() {
        let (arena, evaluatable, state) = test_state();
        let env = Env {
            state: state.values(),
            action: &[],
            non_fluents: &[],
        };
        let before = evaluatable.evaluate_pd(&arena, &env, &state, 0);
        evaluatable.disable_caching();
        assert_eq!(evaluatable.pd_cache_policy(), CachePolicy::DisabledMap);
        let after = evaluatable.evaluate_pd(&arena, &env, &state, 0);
        assert_eq!(before, after);
    }
}
