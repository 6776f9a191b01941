//! `learn`: run IDS's one-off learning phase against a task, sampling
//! the training set by random-walking from the initial state (the task
//! format's own training-set section, §6, is not yet read by the
//! loader), and report the depth it settled on.

use clap::Parser;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::io::BufReader;
use thts_planner::lock::RewardLockTable;
use thts_planner::search::{EngineContext, Ids, IdsConfig};
use thts_planner::task::load_task;
use thts_planner::log_init;

#[derive(Parser, Debug)]
#[command(author, version, about = "tune IDS's maximum depth against a timeout budget", long_about = None)]
struct LearnArgs {
    #[arg(required = true)]
    task: String,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, default_value_t = 64)]
    training_set_size: usize,
}

fn sample_training_states(ctx: &EngineContext, seed: u64, count: usize) -> Vec<thts_planner::state::State> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut states = Vec::with_capacity(count);
    let mut state = ctx.task.initial_state.clone();
    while states.len() < count {
        if state.steps_to_go() == 0 {
            state = ctx.task.initial_state.clone();
            continue;
        }
        states.push(state.clone());
        let applicable = ctx.task.applicable_actions(&state, true);
        let candidates: Vec<usize> = (0..applicable.len()).filter(|&a| applicable[a] >= 0).collect();
        let action_idx = candidates[rng.random_range(0..candidates.len())];
        state = ctx.task.calc_successor_state(&state, &ctx.task.action_states[action_idx], &mut rng);
    }
    states
}

fn run() -> anyhow::Result<()> {
    log_init();
    let args = LearnArgs::parse();

    let file = std::fs::File::open(&args.task)?;
    let task = load_task(BufReader::new(file))?;
    log::info!("loaded task `{}` for IDS learning", task.name);

    let locks = RewardLockTable::new();
    let ctx = EngineContext { task: &task, locks: &locks };
    let training_states = sample_training_states(&ctx, args.seed, args.training_set_size);

    let mut ids = Ids::new(IdsConfig::default());
    ids.learn(&ctx, &training_states);

    println!("learned depth bound {} from {} sampled states", ids.learned_depth(), training_states.len());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    run()
}
