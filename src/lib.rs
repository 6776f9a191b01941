pub mod cli;
pub mod error;
pub mod eval;
pub mod lock;
pub mod logic;
pub mod protocol;
pub mod search;
pub mod state;
pub mod task;
pub mod thts;

/// dimensional aliases, kept distinct so a reviewer can tell a reward
/// apart from a bare probability or hash key at the type level.
pub type Reward = f64;
pub type Probability = f64;
pub type HashKey = i64;
/// a domain value is always a small non-negative integer, carried as
/// f64 so arithmetic expressions can combine it with real-valued CPFs.
pub type Value = f64;

/// disabled hashing is represented by this sentinel throughout.
pub const HASH_DISABLED: HashKey = -1;

/// epsilon used for probability-sum and reward-lock fixed point checks.
pub const EPSILON: f64 = 1e-6;

/// trait for constructing arbitrary instances, used by property tests
/// that need many distinct States/DiscretePDs without hand-authoring
/// each one.
pub trait Arbitrary {
    fn random() -> Self;
}

/// initialize logging: info-level to the terminal, debug-level to a
/// timestamped file under `logs/`.
pub fn log_init() {
    let _ = std::fs::create_dir_all("logs");
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves forward")
        .as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{time}.log")).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    let _ = simplelog::CombinedLogger::init(vec![term, file]);
}

/// progress bar shared by the trial loop and the IDS learning phase.
pub fn progress(n: usize) -> indicatif::ProgressBar {
    let style = "{spinner:.cyan} {elapsed} ~ {percent:>3}% {wide_bar:.cyan} {pos}/{len}";
    let style = indicatif::ProgressStyle::with_template(style).expect("valid template");
    let bar = indicatif::ProgressBar::new(n as u64);
    bar.set_style(style);
    bar
}
