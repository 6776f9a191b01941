criterion::criterion_main!(benches);
criterion::criterion_group! {
    name = benches;
    config = criterion::Criterion::default()
        .without_plots()
        .noise_threshold(3.0)
        .significance_level(0.01)
        .sample_size(10)
        .measurement_time(std::time::Duration::from_secs(1));
    targets =
        evaluating_a_reward_formula,
        sampling_a_joint_successor,
        checking_applicable_actions,
        dfs_on_a_short_horizon_task,
        thts_planning_a_single_step,
}

fn evaluating_a_reward_formula(c: &mut criterion::Criterion) {
    let task = coin_flip_task();
    let action = &task.action_states[1];
    c.bench_function("evaluate the reward formula once", |b| {
        b.iter(|| task.reward(&task.initial_state, action))
    });
}

fn sampling_a_joint_successor(c: &mut criterion::Criterion) {
    let task = coin_flip_task();
    let action = &task.action_states[1];
    let mut rng = rand::rngs::SmallRng::seed_from_u64(7);
    c.bench_function("sample one joint successor state", |b| {
        b.iter(|| task.calc_successor_state(&task.initial_state, action, &mut rng))
    });
}

fn checking_applicable_actions(c: &mut criterion::Criterion) {
    let task = coin_flip_task();
    c.bench_function("compute applicable actions for the initial state", |b| {
        b.iter(|| task.applicable_actions(&task.initial_state, true))
    });
}

fn dfs_on_a_short_horizon_task(c: &mut criterion::Criterion) {
    let task = coin_flip_task();
    let locks = thts_planner::lock::RewardLockTable::new();
    let ctx = thts_planner::search::EngineContext { task: &task, locks: &locks };
    c.bench_function("exhaustive DFS over a horizon-4 coin flip task", |b| {
        b.iter(|| {
            let dfs = thts_planner::search::Dfs::new(false);
            let applicable = task.applicable_actions(&task.initial_state, true);
            thts_planner::search::SearchEngine::estimate_q_values(&dfs, &ctx, &task.initial_state, &applicable)
        })
    });
}

fn thts_planning_a_single_step(c: &mut criterion::Criterion) {
    let task = coin_flip_task();
    let locks = thts_planner::lock::RewardLockTable::new();
    let ctx = thts_planner::search::EngineContext { task: &task, locks: &locks };
    c.bench_function("THTS plans one decision (200 trials)", |b| {
        b.iter(|| {
            let mut thts = thts_planner::thts::Thts::new(thts_planner::thts::ThtsConfig {
                termination: thts_planner::thts::Termination::NumberOfTrials(200),
                action_selection: Box::new(thts_planner::thts::Ucb1::new(1.0, thts_planner::thts::ExplorationFn::Log)),
                outcome_selection: Box::new(thts_planner::thts::MonteCarlo),
                backup: Box::new(thts_planner::thts::MonteCarloBackup),
                initializer: Box::new(thts_planner::thts::ExpandNode::new(Box::new(thts_planner::search::UniformEvaluation::admissible()))),
                recommendation: thts_planner::thts::Recommendation::ExpectedBestArm,
                max_nodes: 8192,
                seed: 11,
            });
            thts.plan(&ctx, &task.initial_state)
        })
    });
}

/// one boolean fluent flipped by a coin-flip CPF, a reward for landing
/// heads, horizon 4: small enough to search exhaustively, stochastic
/// enough to exercise outcome sampling.
fn coin_flip_task() -> thts_planner::task::Task {
    use thts_planner::eval::{CachePolicy, Evaluatable, EvaluatableKind};
    use thts_planner::logic::{Expr, ExprArena};
    use thts_planner::state::{HashParams, State};
    use thts_planner::task::{ActionState, FinalRewardPolicy, Task};

    let mut arena = ExprArena::new();
    let half = arena.constant(0.5);
    let s = arena.push(Expr::StateFluent(0));
    let flip_cpf = arena.push(Expr::Bernoulli(half));
    let reward_expr = s;

    let params = HashParams::disabled(1, 2);
    let initial = State::make(vec![0.0], 4, &params);
    let cpf = Evaluatable::new(0, EvaluatableKind::Cpf { head_fluent: 0, domain_size: 2 }, flip_cpf, flip_cpf, vec![0, 0], CachePolicy::None, 0);
    let reward = Evaluatable::new(
        1,
        EvaluatableKind::Reward { min: 0.0, max: 1.0, action_independent: true },
        reward_expr,
        reward_expr,
        vec![0, 0],
        CachePolicy::None,
        0,
    );
    let noop = ActionState::noop(1);
    let mut flip = ActionState::noop(1);
    flip.index = 1;
    flip.values = vec![1.0];
    Task::new(
        "coin-flip".into(),
        4,
        0.95,
        initial,
        params,
        arena,
        1,
        Vec::new(),
        vec![cpf],
        reward,
        Vec::new(),
        vec![noop, flip],
        FinalRewardPolicy::Noop,
        false,
        0,
    )
    .expect("benchmark fixture is well-formed")
}

use rand::SeedableRng;
