//! `UniformEvaluation`: a constant Q for every applicable action, used
//! as a last-resort heuristic and, configured admissibly, as an
//! optimistic leaf initializer.

use super::engine::{EngineContext, SearchEngine};
use crate::state::State;
use crate::Reward;

pub struct UniformEvaluation {
    /// when set, every applicable action gets this exact Q value.
    /// when `None`, the engine is admissible: it returns the task's
    /// maximum reward as a raw scalar.
    constant: Option<Reward>,
}

impl UniformEvaluation {
    pub fn constant(value: Reward) -> Self {
        Self { constant: Some(value) }
    }

    pub fn admissible() -> Self {
        Self { constant: None }
    }
}

impl SearchEngine for UniformEvaluation {
    fn estimate_q_values(&self, ctx: &EngineContext, _state: &State, applicable: &[i64]) -> Vec<Reward> {
        let value = match self.constant {
            Some(v) => v,
            None => ctx.task.reward_range().1,
        };
        applicable.iter().map(|&a| if a >= 0 { value } else { Reward::NEG_INFINITY }).collect()
    }

    fn max_search_depth(&self) -> u32 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{CachePolicy, Evaluatable, EvaluatableKind};
    use crate::lock::RewardLockTable;
    use crate::logic::ExprArena;
    use crate::state::HashParams;
    use crate::task::{ActionState, FinalRewardPolicy, Task};

    fn trivial_task() -> Task {
        let mut arena = ExprArena::new();
        let r = arena.constant(0.0);
        let params = HashParams::disabled(0, 1);
        let initial = State::make(vec![], 2, &params);
        let reward = Evaluatable::new(0, EvaluatableKind::Reward { min: -1.0, max: 1.0, action_independent: true }, r, r, vec![0], CachePolicy::None, 0);
        Task::new("trivial".into(), 2, 1.0, initial, params, arena, 0, Vec::new(), Vec::new(), reward, Vec::new(), vec![ActionState::noop(0)], FinalRewardPolicy::Noop, false, 0).unwrap()
    }

    #[test]
    fn admissible_uniform_evaluation_returns_the_task_max_reward() {
        let task = trivial_task();
        let locks = RewardLockTable::new();
        let ctx = EngineContext { task: &task, locks: &locks };
        let engine = UniformEvaluation::admissible();
        let q = engine.estimate_q_values(&ctx, &task.initial_state, &[0]);
        assert_eq!(q, vec![1.0]);
    }

    #[test]
    fn inapplicable_actions_get_negative_infinity() {
        let task = trivial_task();
        let locks = RewardLockTable::new();
        let ctx = EngineContext { task: &task, locks: &locks };
        let engine = UniformEvaluation::constant(5.0);
        let q = engine.estimate_q_values(&ctx, &task.initial_state, &[-1, 0]);
        assert_eq!(q[0], Reward::NEG_INFINITY);
        assert_eq!(q[1], 5.0);
    }
}
