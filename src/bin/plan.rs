//! `plan`: load a task description and an engine descriptor, then run
//! one episode against the task's own transition model, printing the
//! action chosen at every step and the discounted return at the end.

use clap::Parser;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::io::BufReader;
use thts_planner::cli::{self, Args};
use thts_planner::lock::RewardLockTable;
use thts_planner::search::EngineContext;
use thts_planner::task::load_task;
use thts_planner::{log_init, Reward};

fn run() -> anyhow::Result<()> {
    log_init();
    let args = Args::parse();

    let file = std::fs::File::open(&args.task)?;
    let task = load_task(BufReader::new(file))?;
    log::info!("loaded task `{}` (horizon {}, discount {})", task.name, task.horizon, task.discount);

    let mut engine = cli::parse_descriptor(&args.engine, &task, args.seed)?;
    let locks = RewardLockTable::new();
    let ctx = EngineContext { task: &task, locks: &locks };

    let mut rng = SmallRng::seed_from_u64(args.seed);
    let mut state = task.initial_state.clone();
    let mut discounted: Reward = 0.0;
    let mut discount = 1.0;
    let mut step = 0u32;

    while state.steps_to_go() > 0 {
        let action_index = engine.plan(&ctx, &state);
        let action = &task.action_states[action_index];
        let reward = task.reward(&state, action);
        log::info!("step {step}: action `{}` ({} steps to go), reward {reward:.4}", action_index, state.steps_to_go());
        discounted += discount * reward;
        discount *= task.discount;
        state = task.calc_successor_state(&state, action, &mut rng);
        step += 1;
    }

    println!("episode return: {discounted:.6} over {step} steps");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    run()
}
