//! The THTS trial loop: `init_step` resets the node pool and allocates
//! a root; the main loop runs trials (`visit_decision` / `visit_chance`)
//! until a [`Termination`] predicate fires, checked only at trial
//! boundaries; `recommend` reads off the chosen action.

use super::action_selection::ActionSelection;
use super::backup::BackupFunction;
use super::initializer::Initializer;
use super::node::{NodeArena, NodeId};
use super::outcome_selection::OutcomeSelection;
use super::recommend::Recommendation;
use super::termination::Termination;
use crate::search::EngineContext;
use crate::state::kleene::{ValueKey, ValueSet};
use crate::state::{KleeneState, State};
use crate::Reward;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::time::Instant;

pub struct ThtsConfig {
    pub termination: Termination,
    pub action_selection: Box<dyn ActionSelection>,
    pub outcome_selection: Box<dyn OutcomeSelection>,
    pub backup: Box<dyn BackupFunction>,
    pub initializer: Box<dyn Initializer>,
    pub recommendation: Recommendation,
    /// node arena capacity: a pre-sized, reused pool.
    pub max_nodes: usize,
    pub seed: u64,
}

/// one engine per planning thread: THTS itself is single-threaded,
/// driven off one shared PRNG stream; only the leaf initializer's
/// sub-engine is allowed its own concurrency, as documented on
/// [`crate::search::RandomWalk`].
pub struct Thts {
    config: ThtsConfig,
    arena: NodeArena,
    rng: SmallRng,
}

impl Thts {
    pub fn new(config: ThtsConfig) -> Self {
        let arena = NodeArena::new(config.max_nodes);
        let rng = SmallRng::seed_from_u64(config.seed);
        Self { config, arena, rng }
    }

    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// `init_step` + main loop + `recommend`: plan one decision from
    /// `state`, returning an index into `task.action_states`.
    pub fn plan(&mut self, ctx: &EngineContext, state: &State) -> usize {
        self.arena.reset_pool();
        if let Some(a) = reward_lock_status(ctx, state) {
            return a;
        }
        let applicable = ctx.task.applicable_actions(state, true);
        let root = self
            .arena
            .get_decision_node(state.clone(), applicable.len())
            .expect("a freshly reset arena always has room for the root");
        self.ensure_initialized(ctx, root);

        let started = Instant::now();
        let mut trials = 0u32;
        while !self.arena.get(root).common().solved && !self.config.termination.should_stop(started, trials) && !self.arena.is_full() {
            self.visit_decision(ctx, root, true);
            trials += 1;
        }
        self.config.recommendation.recommend(&self.arena, root, &applicable, &mut self.rng)
    }

    /// "ExpandNode": seed a freshly-allocated decision node's children
    /// with a Q-value per applicable action, short-circuiting through a
    /// reward lock or the horizon first.
    fn ensure_initialized(&mut self, ctx: &EngineContext, decision: NodeId) {
        if self.arena.get(decision).common().initialized {
            return;
        }
        let state = self.arena.get(decision).as_decision().state.clone();

        if state.steps_to_go() == 0 {
            let v = ctx.task.optimal_final_reward(&state);
            let d = self.arena.get_mut(decision).as_decision_mut();
            d.common.future_reward = v;
            d.common.solved = true;
            d.common.initialized = true;
            return;
        }

        if let Some(a) = reward_lock_status(ctx, &state) {
            let terminal = ctx.task.reward(&state, &ctx.task.action_states[a]) * state.steps_to_go() as f64;
            let d = self.arena.get_mut(decision).as_decision_mut();
            d.common.future_reward = terminal;
            d.common.solved = true;
            d.common.reward_lock = true;
            d.common.initialized = true;
            return;
        }

        let applicable = ctx.task.applicable_actions(&state, true);
        let q_seed = self.config.initializer.initialize(ctx, &state, &applicable);
        let mut best = Reward::NEG_INFINITY;
        for a in 0..applicable.len() {
            let entry = applicable[a];
            if entry < 0 {
                continue;
            }
            best = best.max(q_seed[a]);
            if entry as usize != a {
                let shared = self.arena.get(decision).as_decision().common.children[entry as usize];
                self.arena.get_mut(decision).as_decision_mut().common.children[a] = shared;
                continue;
            }
            let action = &ctx.task.action_states[a];
            let r_sa = ctx.task.reward(&state, action);
            let pending = ctx.task.sample_successor(&state, action);
            let chance_id = match self.arena.get_chance_node(pending, state.steps_to_go()) {
                Some(id) => id,
                None => continue,
            };
            let chance = self.arena.get_mut(chance_id).as_chance_mut();
            chance.common.immediate_reward = r_sa;
            // `q_seed[a]` is a total over the remaining horizon (the initializer
            // already applied heuristicWeight * steps_to_go), so subtracting the
            // one-step immediate reward leaves the future-reward component.
            chance.common.future_reward = q_seed[a] - r_sa;
            chance.common.visits = 1; // the heuristic seed counts as the first sample
            self.arena.get_mut(decision).as_decision_mut().common.children[a] = Some(chance_id);
        }
        let d = self.arena.get_mut(decision).as_decision_mut();
        d.common.future_reward = if best.is_finite() { best } else { 0.0 };
        d.common.initialized = true;
    }

    /// `visit_decision`: select an action, recurse through its chance
    /// child, back both nodes up, and return the decision node's
    /// (possibly just-updated) value estimate.
    fn visit_decision(&mut self, ctx: &EngineContext, decision: NodeId, root: bool) -> Reward {
        self.ensure_initialized(ctx, decision);
        if self.arena.get(decision).common().solved {
            self.arena.get_mut(decision).common_mut().visits += 1;
            return self.arena.get(decision).common().expected_reward_estimate();
        }
        let state = self.arena.get(decision).as_decision().state.clone();
        let applicable = ctx.task.applicable_actions(&state, true);
        let action_idx = self.config.action_selection.select_action(&self.arena, decision, &applicable, root, &mut self.rng);
        let chance_id = self.arena.get(decision).as_decision().common.children[action_idx].expect("an initialized applicable action always has a chance child");

        let child_v = self.visit_chance(ctx, chance_id);
        self.config.backup.backup_chance(&mut self.arena, chance_id, ctx.task.discount, child_v);
        self.config.backup.backup_decision(&mut self.arena, decision, action_idx, &applicable);
        self.arena.get(decision).common().expected_reward_estimate()
    }

    /// `visit_chance`: draw a successor (reusing an earlier sample when
    /// the state recurs), recurse into its decision node, and return
    /// that node's value estimate undiscounted (the caller applies the
    /// discount in `backup_chance`).
    fn visit_chance(&mut self, ctx: &EngineContext, chance: NodeId) -> Reward {
        let pending = self.arena.get(chance).as_chance().pending.clone();
        let outcomes_snapshot = self.arena.get(chance).as_chance().outcomes.clone();
        let arena_ref = &self.arena;
        let solved_lookup = move |s: &State| {
            let key = s.hash_key();
            outcomes_snapshot
                .iter()
                .find(|&&(k, _)| k == key)
                .map(|&(_, id)| arena_ref.get(id).common().solved)
                .unwrap_or(false)
        };
        let sampled = self
            .config
            .outcome_selection
            .select_outcome(&pending, &ctx.task.hash_params, &solved_lookup, &mut self.rng);

        let key = sampled.hash_key();
        let existing = self.arena.get(chance).as_chance().find_outcome(key);
        let child = match existing {
            Some(id) => id,
            None => {
                let prob = pending.probability_of(sampled.values());
                match self.arena.get_decision_node(sampled.clone(), ctx.task.action_states.len()) {
                    Some(id) => {
                        self.arena.get_mut(id).as_decision_mut().common.prob = prob;
                        // recorded unconditionally: `PartialBellmanBackup` folds over every
                        // sampled outcome regardless of whether hashing-based dedup is on.
                        self.arena.get_mut(chance).as_chance_mut().outcomes.push((key, id));
                        id
                    }
                    None => return ctx.task.optimal_final_reward(&sampled),
                }
            }
        };
        self.visit_decision(ctx, child, false)
    }
}

/// the reward lock, queried the way the existing unit tests for
/// [`crate::lock::RewardLockTable`] do: a concrete state's own hash key
/// doubles as the memo key for its (trivially singleton) Kleene state.
fn reward_lock_status(ctx: &EngineContext, state: &State) -> Option<usize> {
    if !ctx.task.reward_lock_detection {
        return None;
    }
    let kleene = KleeneState::from_state(state);
    let slots: Vec<ValueSet> = kleene.slots().iter().map(|slot| slot.values().map(ValueKey).collect()).collect();
    let key = state.hash_key();
    if ctx.locks.is_dead_end(ctx.task, key, &slots) {
        return Some(0);
    }
    if ctx.locks.is_goal(ctx.task, key, &slots) {
        return Some(ctx.task.goal_test_action);
    }
    None
}
