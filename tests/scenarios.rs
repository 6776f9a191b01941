//! End-to-end scenarios exercising the task model, reward-lock
//! detection, and the THTS trial loop together, each built from a
//! hand-authored task rather than a parsed file.

use thts_planner::eval::{CachePolicy, Evaluatable, EvaluatableKind};
use thts_planner::lock::RewardLockTable;
use thts_planner::logic::{Expr, ExprArena};
use thts_planner::search::{Dfs, EngineContext, SearchEngine, UniformEvaluation};
use thts_planner::state::kleene::{ValueKey, ValueSet};
use thts_planner::state::{HashParams, KleeneState, State};
use thts_planner::task::{ActionState, FinalRewardPolicy, Task};
use thts_planner::thts::{
    BackupFunction, ExpandNode, ExplorationFn, MonteCarlo, MonteCarloBackup, NodeArena, PartialBellmanBackup, Recommendation,
    Termination, Thts, ThtsConfig, Ucb1,
};

/// scenario 1: a single boolean fluent whose CPF is `KronDelta(~s)`,
/// horizon 3, reward = `s`. The only action is noop, so `s` flips every
/// step: 0, 1, 0, collecting reward 0 + 1 + 0 = 1 across the three
/// transitions, found exhaustively by DFS.
#[test]
fn dirac_only_cpf_flips_and_banks_reward() {
    let mut arena = ExprArena::new();
    let s = arena.push(Expr::StateFluent(0));
    let not_s = arena.push(Expr::Not(s));
    let flip = arena.push(Expr::KronDelta(not_s));

    let params = HashParams::disabled(1, 2);
    let initial = State::make(vec![0.0], 3, &params);
    let cpf = Evaluatable::new(0, EvaluatableKind::Cpf { head_fluent: 0, domain_size: 2 }, flip, flip, vec![0], CachePolicy::None, 0);
    let reward = Evaluatable::new(
        1,
        EvaluatableKind::Reward { min: 0.0, max: 1.0, action_independent: true },
        s,
        s,
        vec![0],
        CachePolicy::None,
        0,
    );
    let task = Task::new(
        "dirac-flip".into(),
        3,
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
        false,
        0,
    )
    .unwrap();

    let locks = RewardLockTable::new();
    let ctx = EngineContext { task: &task, locks: &locks };
    let dfs = Dfs::new(false);
    let applicable = task.applicable_actions(&task.initial_state, true);
    let q = dfs.estimate_q_values(&ctx, &task.initial_state, &applicable);
    assert!((q[0] - 1.0).abs() < 1e-9, "expected total return 1.0, got {}", q[0]);
}

/// scenario 2: `s`'s CPF is `if a then KronDelta(1) else Bernoulli(0.5)`,
/// reward = `s`, the goal-test action is `a`. Once `s` reaches 1 under
/// `a`, it is a Kleene-provable goal lock: the reward-lock table proves
/// it without any sampling, and a fresh THTS plan from that state
/// short-circuits through the lock rather than allocating a node.
#[test]
fn bernoulli_with_goal_lock_short_circuits_once_proven() {
    let mut arena = ExprArena::new();
    let a = arena.push(Expr::ActionFluent(0));
    let one = arena.constant(1.0);
    let half = arena.constant(0.5);
    let kron = arena.push(Expr::KronDelta(one));
    let bernoulli = arena.push(Expr::Bernoulli(half));
    let cpf_expr = arena.push(Expr::IfThenElse(a, kron, bernoulli));
    let s = arena.push(Expr::StateFluent(0));

    let params = HashParams::disabled(1, 2);
    let cpf = Evaluatable::new(0, EvaluatableKind::Cpf { head_fluent: 0, domain_size: 2 }, cpf_expr, cpf_expr, vec![0, 0], CachePolicy::None, 0);
    let reward = Evaluatable::new(
        1,
        EvaluatableKind::Reward { min: 0.0, max: 1.0, action_independent: false },
        s,
        s,
        vec![0, 0],
        CachePolicy::None,
        0,
    );
    let noop = ActionState::noop(1);
    let mut act = ActionState::noop(1);
    act.index = 1;
    act.values = vec![1.0];
    act.scheduled = vec![0];

    let task = Task::new(
        "bernoulli-goal".into(),
        2,
        1.0,
        State::make(vec![1.0], 2, &params),
        params,
        arena,
        1,
        Vec::new(),
        vec![cpf],
        reward,
        Vec::new(),
        vec![noop, act],
        FinalRewardPolicy::Noop,
        true,
        1, // goal-test action is `a`
    )
    .unwrap();

    let goal_state = task.initial_state.clone();
    let kleene = KleeneState::from_state(&goal_state);
    let slots: Vec<ValueSet> = kleene.slots().iter().map(|slot| slot.values().map(ValueKey).collect()).collect();
    let locks = RewardLockTable::new();
    assert!(locks.is_goal(&task, goal_state.hash_key(), &slots), "s=1 under action `a` should be a provable goal lock");

    let ctx = EngineContext { task: &task, locks: &locks };
    let mut thts = Thts::new(ThtsConfig {
        termination: Termination::NumberOfTrials(200),
        action_selection: Box::new(Ucb1::new(1.0, ExplorationFn::Log)),
        outcome_selection: Box::new(MonteCarlo),
        backup: Box::new(MonteCarloBackup),
        initializer: Box::new(ExpandNode::new(Box::new(UniformEvaluation::admissible()))),
        recommendation: Recommendation::ExpectedBestArm,
        max_nodes: 4096,
        seed: 42,
    });
    let chosen = thts.plan(&ctx, &goal_state);
    assert_eq!(chosen, 1, "the goal-test action should be recommended directly from the lock");
    assert_eq!(thts.node_count(), 0, "a proven lock must short-circuit before any node is allocated");
}

/// scenario 3: two action fluents whose determinized CPFs collapse to
/// the same successor; the applicability vector must mark the later
/// action as a duplicate of the earlier one, never as independently
/// reasonable.
#[test]
fn unreasonable_action_pruning_collapses_identical_successors() {
    let mut arena = ExprArena::new();
    let a1 = arena.push(Expr::ActionFluent(0));
    let a2 = arena.push(Expr::ActionFluent(1));
    let either = arena.push(Expr::Or(vec![a1, a2]));
    let cpf = arena.push(Expr::KronDelta(either));

    let params = HashParams::disabled(1, 3);
    let initial = State::make(vec![0.0], 2, &params);
    let cpf_eval = Evaluatable::new(0, EvaluatableKind::Cpf { head_fluent: 0, domain_size: 2 }, cpf, cpf, vec![0, 0, 0], CachePolicy::None, 0);
    let reward = Evaluatable::new(
        1,
        EvaluatableKind::Reward { min: 0.0, max: 1.0, action_independent: true },
        cpf,
        cpf,
        vec![0, 0, 0],
        CachePolicy::None,
        0,
    );

    let noop = ActionState::noop(2);
    let mut act1 = ActionState::noop(2);
    act1.index = 1;
    act1.values = vec![1.0, 0.0];
    act1.scheduled = vec![0];
    let mut act2 = ActionState::noop(2);
    act2.index = 2;
    act2.values = vec![0.0, 1.0];
    act2.scheduled = vec![1];

    let task = Task::new(
        "duplicate-actions".into(),
        2,
        1.0,
        initial,
        params,
        arena,
        2,
        Vec::new(),
        vec![cpf_eval],
        reward,
        Vec::new(),
        vec![noop, act1, act2],
        FinalRewardPolicy::Noop,
        false,
        0,
    )
    .unwrap();

    let applicable = task.applicable_actions(&task.initial_state, true);
    assert_eq!(applicable[0], 0, "noop is reasonable and self-indexes");
    assert_eq!(applicable[1], 1, "the first action to reach a successor is reasonable");
    assert_eq!(applicable[2], 1, "the second action reaches the same successor and is marked a duplicate of the first");
}

/// scenario 4: a candidate set {1, 2, 5} with rewards 0.2, 0.5, -0.1
/// respectively; `FinalRewardPolicy::BestOfCandidateSet` must resolve
/// to the highest-reward candidate, action index 2, value 0.5.
#[test]
fn best_of_candidate_set_picks_the_highest_reward_candidate() {
    let mut arena = ExprArena::new();
    let c0 = arena.constant(0.2);
    let c1 = arena.constant(0.5);
    let c2 = arena.constant(-0.1);
    let a0 = arena.push(Expr::ActionFluent(0));
    let a1 = arena.push(Expr::ActionFluent(1));
    let branch0 = arena.push(Expr::IfThenElse(a0, c0, c2));
    let reward_expr = arena.push(Expr::IfThenElse(a1, c1, branch0));
    let cpf_expr = arena.push(Expr::StateFluent(0));

    let params = HashParams::disabled(1, 2);
    let initial = State::make(vec![0.0], 1, &params);
    let reward = Evaluatable::new(
        0,
        EvaluatableKind::Reward { min: -1.0, max: 1.0, action_independent: false },
        reward_expr,
        reward_expr,
        vec![0, 0, 0, 0, 0, 0],
        CachePolicy::None,
        0,
    );
    let cpf = Evaluatable::new(
        1,
        EvaluatableKind::Cpf { head_fluent: 0, domain_size: 2 },
        cpf_expr,
        cpf_expr,
        vec![0, 0, 0, 0, 0, 0],
        CachePolicy::None,
        0,
    );
    let mut noop = ActionState::noop(2);
    noop.index = 0;
    let mut candidate1 = ActionState::noop(2);
    candidate1.index = 1;
    candidate1.values = vec![1.0, 0.0];
    candidate1.scheduled = vec![0];
    let mut candidate2 = ActionState::noop(2);
    candidate2.index = 2;
    candidate2.values = vec![0.0, 1.0];
    candidate2.scheduled = vec![1];

    let task = Task::new(
        "best-of-candidate-set".into(),
        1,
        1.0,
        initial,
        params,
        arena,
        2,
        Vec::new(),
        vec![cpf],
        reward,
        Vec::new(),
        vec![noop.clone(), candidate1, candidate2, noop.clone(), noop.clone(), noop],
        FinalRewardPolicy::BestOfCandidateSet(vec![1, 2, 5]),
        false,
        0,
    )
    .unwrap();

    assert_eq!(task.optimal_final_action(&task.initial_state), 2);
    let value = task.optimal_final_reward(&task.initial_state);
    assert!((value - 0.5).abs() < 1e-9, "expected the best candidate's reward 0.5, got {value}");
}

/// scenario 6: two decision-node children with identical Q and visit
/// counts, parent visits fixed at 10, should each be picked roughly
/// half the time by UCB1's tie-breaking across many independent calls
/// (the `ties` branch of `select_action`, exercised without ever
/// hitting the "unvisited" fast path since both children already have
/// one visit).
#[test]
fn ucb1_breaks_exact_ties_close_to_uniformly() {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use thts_planner::thts::ActionSelection;

    let mut arena = NodeArena::new(16);
    let params = HashParams::disabled(0, 1);
    let state = State::make(vec![], 5, &params);
    let decision = arena.get_decision_node(state, 2).unwrap();

    let pending = thts_planner::state::PDState::new(vec![], 4);
    let c0 = arena.get_chance_node(pending.clone(), 5).unwrap();
    let c1 = arena.get_chance_node(pending, 5).unwrap();
    for &(chance, visits) in &[(c0, 5u32), (c1, 5u32)] {
        let common = arena.get_mut(chance).common_mut();
        common.visits = visits;
        common.future_reward = 0.5;
    }
    {
        let d = arena.get_mut(decision).as_decision_mut();
        d.common.children[0] = Some(c0);
        d.common.children[1] = Some(c1);
        d.common.visits = 10;
    }

    let ucb1 = Ucb1::new(1.0, ExplorationFn::Log);
    let mut rng = SmallRng::seed_from_u64(99);
    let mut counts = [0u32; 2];
    for _ in 0..10_000 {
        let chosen = ucb1.select_action(&arena, decision, &[0, 1], false, &mut rng);
        counts[chosen] += 1;
    }
    let fraction = counts[0] as f64 / 10_000.0;
    assert!((fraction - 0.5).abs() < 0.03, "expected ~50/50 split, got {fraction}");
}

/// a decision node with two applicable actions, each leading to a
/// chance node with a single, already-solved terminal outcome. The
/// first trial (action 0) cannot mark the decision node solved yet,
/// since action 1's chance child isn't allocated. The second trial
/// (action 1) completes the set: every applicable action now has an
/// allocated, solved chance child, so `PartialBellmanBackup` marks the
/// decision node solved and skips further value propagation through it
/// (the "mark solved, skip backups" rule, distinct from the chance-node
/// backup lock below).
#[test]
fn decision_node_freezes_once_every_applicable_action_is_solved() {
    let params = HashParams::disabled(0, 1);
    let mut arena = NodeArena::new(16);

    let terminal = |arena: &mut NodeArena, value: f64| {
        let state = State::make(vec![], 0, &params);
        let id = arena.get_decision_node(state, 0).unwrap();
        arena.get_mut(id).common_mut().solved = true;
        arena.get_mut(id).common_mut().future_reward = value;
        id
    };
    let t0 = terminal(&mut arena, 3.0);
    let t1 = terminal(&mut arena, 5.0);

    let pending = thts_planner::state::PDState::new(vec![], 0);
    let c0 = arena.get_chance_node(pending.clone(), 0).unwrap();
    let c1 = arena.get_chance_node(pending, 0).unwrap();
    arena.get_mut(t0).common_mut().prob = 1.0;
    arena.get_mut(t1).common_mut().prob = 1.0;
    arena.get_mut(c0).as_chance_mut().outcomes.push((thts_planner::HASH_DISABLED, t0));
    arena.get_mut(c1).as_chance_mut().outcomes.push((thts_planner::HASH_DISABLED, t1));

    let root_state = State::make(vec![], 1, &params);
    let decision = arena.get_decision_node(root_state, 2).unwrap();
    {
        let d = arena.get_mut(decision).as_decision_mut();
        d.common.children[0] = Some(c0);
        d.common.children[1] = Some(c1);
    }

    let backup = PartialBellmanBackup;
    let applicable = [0i64, 1i64];

    // trial 1: visit action 0, whose only outcome is the solved terminal t0.
    backup.backup_chance(&mut arena, c0, 1.0, 3.0);
    backup.backup_decision(&mut arena, decision, 0, &applicable);
    assert!(!arena.get(decision).common().solved, "action 1 has no allocated child yet, so the set isn't complete");
    assert_eq!(arena.get(decision).common().visits, 1);
    assert!((arena.get(decision).common().future_reward - 3.0).abs() < 1e-9);

    // trial 2: visit action 1, completing the set of allocated, solved children.
    backup.backup_chance(&mut arena, c1, 1.0, 5.0);
    backup.backup_decision(&mut arena, decision, 1, &applicable);
    assert!(arena.get(decision).common().solved, "both actions now have allocated, solved chance children");
    assert_eq!(arena.get(decision).common().visits, 2);
    assert!((arena.get(decision).common().future_reward - 5.0).abs() < 1e-9);

    // trial 3: revisiting action 0 only advances the visit count; the
    // frozen value is untouched even though action 0's own estimate (3.0)
    // is lower than the locked value (5.0).
    backup.backup_chance(&mut arena, c0, 1.0, 3.0);
    backup.backup_decision(&mut arena, decision, 0, &applicable);
    assert_eq!(arena.get(decision).common().visits, 3, "a locked decision node still counts visits");
    assert!(
        (arena.get(decision).common().future_reward - 5.0).abs() < 1e-9,
        "a locked decision node's future_reward must not be recomputed"
    );
}

/// scenario 5: a chance node with a single outcome whose Q-estimate is
/// backed up three times in a row without changing. The lock engages on
/// the third (second-repetition) backup: a fourth backup, even with the
/// outcome's own value mutated underneath it, must advance the visit
/// count but leave `future_reward` untouched. Sampling a brand-new
/// outcome (a subtree change) then releases the lock, and the very next
/// backup recomputes `future_reward` from scratch over both outcomes.
#[test]
fn backup_lock_freezes_chance_future_reward_after_two_repetitions() {
    let params = HashParams::disabled(0, 1);
    let mut arena = NodeArena::new(16);

    let outcome = |arena: &mut NodeArena, value: f64| {
        let id = arena.get_decision_node(State::make(vec![], 0, &params), 0).unwrap();
        let common = arena.get_mut(id).common_mut();
        common.prob = 1.0;
        common.future_reward = value;
        id
    };
    let d0 = outcome(&mut arena, 5.0);

    // steps_to_go = 2 keeps this node within BACKUP_LOCK_DEPTH.
    let pending = thts_planner::state::PDState::new(vec![], 2);
    let chance = arena.get_chance_node(pending, 2).unwrap();
    arena.get_mut(chance).as_chance_mut().outcomes.push((thts_planner::HASH_DISABLED, d0));

    let backup = PartialBellmanBackup;

    // trials 1-3: the outcome's value never changes, so the lock streak
    // climbs to the repeat threshold and engages on the third backup.
    backup.backup_chance(&mut arena, chance, 1.0, 0.0);
    assert!((arena.get(chance).common().future_reward - 5.0).abs() < 1e-9);
    assert_eq!(arena.get(chance).common().visits, 1);
    assert!(!arena.get(chance).common().backup_locked);

    backup.backup_chance(&mut arena, chance, 1.0, 0.0);
    assert!((arena.get(chance).common().future_reward - 5.0).abs() < 1e-9);
    assert_eq!(arena.get(chance).common().visits, 2);
    assert!(!arena.get(chance).common().backup_locked, "one repetition is not enough to engage the lock");

    backup.backup_chance(&mut arena, chance, 1.0, 0.0);
    assert!((arena.get(chance).common().future_reward - 5.0).abs() < 1e-9);
    assert_eq!(arena.get(chance).common().visits, 3);
    assert!(arena.get(chance).common().backup_locked, "two repetitions engage the lock");

    // trial 4: mutate the outcome's own value; the lock must suppress the
    // recomputation that would otherwise pick it up.
    arena.get_mut(d0).common_mut().future_reward = 9.0;
    backup.backup_chance(&mut arena, chance, 1.0, 0.0);
    assert_eq!(arena.get(chance).common().visits, 4, "a locked chance node still counts visits");
    assert!(
        (arena.get(chance).common().future_reward - 5.0).abs() < 1e-9,
        "a locked chance node's future_reward must not be recomputed"
    );

    // a subtree change (a freshly sampled outcome) releases the lock, and
    // the next backup recomputes over both outcomes.
    let d1 = outcome(&mut arena, 3.0);
    arena.get_mut(chance).as_chance_mut().outcomes.push((thts_planner::HASH_DISABLED, d1));
    backup.backup_chance(&mut arena, chance, 1.0, 0.0);
    assert!(!arena.get(chance).common().backup_locked, "a subtree change releases the lock");
    assert_eq!(arena.get(chance).common().visits, 5);
    assert!(
        (arena.get(chance).common().future_reward - 6.0).abs() < 1e-9,
        "the released lock recomputes the mean over both outcomes: (9.0 + 3.0) / 2 = 6.0"
    );
}
