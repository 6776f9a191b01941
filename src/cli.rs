//! Engine descriptor parsing: the top-level flags (task path, seed,
//! output) are an ordinary derived [`clap::Parser`], but the engine
//! descriptor itself — `[SE -flag value … -flag [SubSE …] …]` — nests
//! arbitrarily deep, so it gets its own small recursive-descent reader
//! in the style of [`crate::task::loader`]'s formula parser rather than
//! being shoehorned into clap's flat subcommand model.

use crate::error::ConfigError;
use crate::search::{Dfs, EngineContext, Ids, IdsConfig, MinimalLookahead, RandomWalk, SearchEngine, UniformEvaluation};
use crate::state::State;
use crate::task::Task;
use crate::thts::{
    ActionSelection, BackupFunction, ExpandNode, ExplorationFn, Initializer, LeafBackup, MaxMonteCarloBackup, MonteCarlo, MonteCarloBackup,
    OutcomeSelection, PartialBellmanBackup, Recommendation, Termination, Thts, ThtsConfig, Ucb1, UnsolvedMonteCarlo,
};
use clap::Parser;
use std::time::Duration;

/// top-level arguments shared by the `plan` and `learn` binaries.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// path to a task description in the §6 line-oriented format.
    #[arg(required = true)]
    pub task: String,
    /// engine descriptor, e.g. `[THTS -act [Ucb1] -out [MonteCarlo]
    /// -backup [MonteCarloBackup] -init [Uniform]]`, or a shortcut name
    /// such as `IPPC2011`.
    #[arg(required = true)]
    pub engine: String,
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

/// a fully constructed planner: either the THTS trial loop or one of
/// the simple engines run standalone (its own best-action estimate
/// taken directly, with no tree search wrapped around it).
pub enum PlannerEngine {
    Thts(Box<Thts>),
    Simple(Box<dyn SearchEngine + Send + Sync>),
}

impl std::fmt::Debug for PlannerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlannerEngine::Thts(_) => f.write_str("PlannerEngine::Thts(..)"),
            PlannerEngine::Simple(_) => f.write_str("PlannerEngine::Simple(..)"),
        }
    }
}

impl PlannerEngine {
    pub fn plan(&mut self, ctx: &EngineContext, state: &State) -> usize {
        match self {
            PlannerEngine::Thts(thts) => thts.plan(ctx, state),
            PlannerEngine::Simple(engine) => {
                let applicable = ctx.task.applicable_actions(state, true);
                let q = engine.estimate_q_values(ctx, state, &applicable);
                q.iter()
                    .enumerate()
                    .max_by(|&(_, a), &(_, b)| a.partial_cmp(b).expect("reward is never NaN"))
                    .map(|(i, _)| i)
                    .expect("task always has at least one action")
            }
        }
    }

    pub fn disable_caching(&mut self) {
        match self {
            PlannerEngine::Thts(_) => {}
            PlannerEngine::Simple(engine) => engine.disable_caching(),
        }
    }
}

/// the common flags every engine name accepts, collected before the
/// engine-specific ones are read.
#[derive(Debug, Clone, Copy, Default)]
struct CommonFlags {
    caching: Option<bool>,
    max_depth: Option<u32>,
    timeout: Option<Duration>,
    reward_lock_detection: Option<bool>,
    cache_locks: Option<bool>,
}

/// parse a full engine descriptor against a loaded task, whose reward
/// range and action count seed the ingredients' defaults.
pub fn parse_descriptor(input: &str, task: &Task, seed: u64) -> Result<PlannerEngine, ConfigError> {
    let tokens = tokenize(input);
    let mut cursor = Cursor::new(&tokens);
    let engine = if cursor.peek() == Some("[") {
        let mut inner = cursor.bracket()?;
        let engine = parse_engine(&mut inner, task, seed)?;
        if inner.peek().is_some() {
            return Err(ConfigError::MalformedDescriptor(format!("trailing input inside descriptor: {}", input)));
        }
        engine
    } else {
        parse_engine(&mut cursor, task, seed)?
    };
    if cursor.peek().is_some() {
        return Err(ConfigError::MalformedDescriptor(format!("trailing input after descriptor: {}", input)));
    }
    Ok(engine)
}

fn tokenize(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    for raw in input.split_whitespace() {
        let mut start = 0;
        for (i, c) in raw.char_indices() {
            if c == '[' || c == ']' {
                if start < i {
                    out.push(raw[start..i].to_string());
                }
                out.push(c.to_string());
                start = i + c.len_utf8();
            }
        }
        if start < raw.len() {
            out.push(raw[start..].to_string());
        }
    }
    out
}

struct Cursor<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [String]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> Result<&'a str, ConfigError> {
        let tok = self.tokens.get(self.pos).ok_or_else(|| ConfigError::MalformedDescriptor("unexpected end of descriptor".into()))?;
        self.pos += 1;
        Ok(tok.as_str())
    }

    fn expect(&mut self, want: &str) -> Result<(), ConfigError> {
        let tok = self.next()?;
        if tok != want {
            return Err(ConfigError::MalformedDescriptor(format!("expected `{}`, found `{}`", want, tok)));
        }
        Ok(())
    }

    /// consume a `[...]` bracket and return its inner tokens as a
    /// sub-cursor, having already matched the opening bracket.
    fn bracket(&mut self) -> Result<Cursor<'a>, ConfigError> {
        self.expect("[")?;
        let start = self.pos;
        let mut depth = 1;
        while depth > 0 {
            match self.next()? {
                "[" => depth += 1,
                "]" => depth -= 1,
                _ => {}
            }
        }
        Ok(Cursor::new(&self.tokens[start..self.pos - 1]))
    }
}

/// `IPPC2011`, `DP-UCT`, etc. expand to a canonical THTS token stream,
/// spliced in place of the shortcut name so the rest of the parser
/// never has to know shortcuts exist.
fn expand_shortcut(name: &str) -> Option<&'static str> {
    match name {
        "IPPC2011" | "UCTStar" => Some("THTS -act [Ucb1] -out [MonteCarlo] -backup [MonteCarloBackup] -init [Uniform]"),
        "IPPC2014" | "DP-UCT" => Some("THTS -act [Ucb1] -out [MonteCarlo] -backup [PartialBellmanBackup] -init [Uniform]"),
        "MC-UCT" => Some("THTS -act [Ucb1] -out [MonteCarlo] -backup [MonteCarloBackup] -init [Uniform] -mv 0"),
        "MaxUCT" => Some("THTS -act [Ucb1] -out [MonteCarlo] -backup [MaxMonteCarloBackup] -init [Uniform]"),
        "BFS" => Some("THTS -act [Ucb1] -out [UnsolvedMonteCarlo] -backup [PartialBellmanBackup] -init [Uniform] -mv 1"),
        _ => None,
    }
}

fn parse_engine(cursor: &mut Cursor<'_>, task: &Task, seed: u64) -> Result<PlannerEngine, ConfigError> {
    let name = cursor.next()?;
    if let Some(expansion) = expand_shortcut(name) {
        let tokens = tokenize(expansion);
        let mut inner = Cursor::new(&tokens);
        return parse_engine(&mut inner, task, seed);
    }

    match name {
        "THTS" => parse_thts(cursor, task, seed).map(|t| PlannerEngine::Thts(Box::new(t))),
        "DFS" => {
            let flags = parse_common_flags(cursor)?;
            Ok(PlannerEngine::Simple(Box::new(Dfs::new(flags.caching.unwrap_or(true)))))
        }
        "MLS" => {
            parse_common_flags(cursor)?;
            Ok(PlannerEngine::Simple(Box::new(MinimalLookahead)))
        }
        "Uniform" => {
            parse_common_flags(cursor)?;
            Ok(PlannerEngine::Simple(Box::new(UniformEvaluation::admissible())))
        }
        "RandomWalk" => {
            parse_common_flags(cursor)?;
            Ok(PlannerEngine::Simple(Box::new(RandomWalk::new(200, seed))))
        }
        "IDS" => {
            let flags = parse_common_flags(cursor)?;
            let mut config = IdsConfig::default();
            if let Some(timeout) = flags.timeout {
                config.timeout = timeout;
            }
            Ok(PlannerEngine::Simple(Box::new(Ids::new(config))))
        }
        other => Err(ConfigError::UnknownEngine(other.to_string())),
    }
}

/// a bare sub-engine name for `-init`: one of the simple engines, never
/// `THTS` itself (nesting a trial loop inside another's leaf
/// initializer is not a supported ingredient).
fn parse_simple_engine(cursor: &mut Cursor<'_>, task: &Task, seed: u64) -> Result<Box<dyn SearchEngine + Send + Sync>, ConfigError> {
    match parse_engine(cursor, task, seed)? {
        PlannerEngine::Simple(engine) => Ok(engine),
        PlannerEngine::Thts(_) => Err(ConfigError::MalformedDescriptor("THTS cannot be its own leaf initializer".into())),
    }
}

fn parse_thts(cursor: &mut Cursor<'_>, task: &Task, seed: u64) -> Result<Thts, ConfigError> {
    let mut action_selection: Option<Box<dyn ActionSelection>> = None;
    let mut outcome_selection: Option<Box<dyn OutcomeSelection>> = None;
    let mut backup: Option<Box<dyn BackupFunction>> = None;
    let mut initializer: Option<Box<dyn Initializer>> = None;
    let mut termination_kind = "TIME_AND_TRIALS";
    let mut max_trials = 200u32;
    let mut most_visited = false;
    let mut max_nodes = 100_000usize;
    let mut common = CommonFlags::default();

    while let Some(flag) = cursor.peek() {
        if !flag.starts_with('-') {
            break;
        }
        let flag = cursor.next()?;
        match flag {
            "-uc" => common.caching = Some(parse_bool(cursor)?),
            "-sd" => common.max_depth = Some(parse_u32(cursor)?),
            "-t" => common.timeout = Some(Duration::from_secs_f64(parse_f64(cursor)?)),
            "-rld" => common.reward_lock_detection = Some(parse_bool(cursor)?),
            "-crl" => common.cache_locks = Some(parse_bool(cursor)?),
            "-act" => action_selection = Some(parse_action_selection(&mut cursor.bracket()?, task)?),
            "-out" => outcome_selection = Some(parse_outcome_selection(&mut cursor.bracket()?)?),
            "-backup" => backup = Some(parse_backup(&mut cursor.bracket()?)?),
            "-init" => {
                let engine = parse_simple_engine(&mut cursor.bracket()?, task, seed)?;
                initializer = Some(Box::new(ExpandNode::new(engine)));
            }
            "-T" => termination_kind = parse_termination_kind(cursor)?,
            "-r" => max_trials = parse_u32(cursor)?,
            "-ndn" => {
                let tok = cursor.next()?;
                if tok != "H" {
                    max_nodes = tok.parse::<usize>().map_err(|_| ConfigError::MalformedDescriptor(format!("invalid -ndn value: {}", tok)))?;
                }
            }
            "-mnn" => max_nodes = parse_u32(cursor)? as usize,
            "-mv" => most_visited = parse_bool(cursor)?,
            other => return Err(ConfigError::UnknownFlag(other.to_string())),
        }
    }

    let timeout = common.timeout.unwrap_or(Duration::from_secs(1));
    let termination = match termination_kind {
        "TIME" => Termination::Time(timeout),
        "TRIALS" => Termination::NumberOfTrials(max_trials),
        _ => Termination::Both(timeout, max_trials),
    };

    Ok(Thts::new(ThtsConfig {
        termination,
        action_selection: action_selection.ok_or(ConfigError::MissingIngredient("action selection"))?,
        outcome_selection: outcome_selection.ok_or(ConfigError::MissingIngredient("outcome selection"))?,
        backup: backup.ok_or(ConfigError::MissingIngredient("backup function"))?,
        initializer: initializer.ok_or(ConfigError::MissingIngredient("leaf initializer"))?,
        recommendation: if most_visited { Recommendation::MostPlayedArm } else { Recommendation::ExpectedBestArm },
        max_nodes,
        seed,
    }))
}

fn parse_common_flags(cursor: &mut Cursor<'_>) -> Result<CommonFlags, ConfigError> {
    let mut flags = CommonFlags::default();
    while let Some(flag) = cursor.peek() {
        if !flag.starts_with('-') {
            break;
        }
        let flag = cursor.next()?;
        match flag {
            "-uc" => flags.caching = Some(parse_bool(cursor)?),
            "-sd" => flags.max_depth = Some(parse_u32(cursor)?),
            "-t" => flags.timeout = Some(Duration::from_secs_f64(parse_f64(cursor)?)),
            "-rld" => flags.reward_lock_detection = Some(parse_bool(cursor)?),
            "-crl" => flags.cache_locks = Some(parse_bool(cursor)?),
            other => return Err(ConfigError::UnknownFlag(other.to_string())),
        }
    }
    Ok(flags)
}

fn parse_action_selection(cursor: &mut Cursor<'_>, _task: &Task) -> Result<Box<dyn ActionSelection>, ConfigError> {
    let name = cursor.next()?;
    match name {
        "Ucb1" => {
            let mut magic = 1.0;
            let mut exploration = ExplorationFn::Log;
            while let Some(flag) = cursor.peek() {
                if !flag.starts_with('-') {
                    break;
                }
                match cursor.next()? {
                    "-c" => magic = parse_f64(cursor)?,
                    "-exp" => {
                        exploration = match cursor.next()? {
                            "log" => ExplorationFn::Log,
                            "sqrt" => ExplorationFn::Sqrt,
                            "identity" => ExplorationFn::Identity,
                            "logsq" => ExplorationFn::LogSquared,
                            other => return Err(ConfigError::UnknownToken(other.to_string())),
                        }
                    }
                    other => return Err(ConfigError::UnknownFlag(other.to_string())),
                }
            }
            Ok(Box::new(Ucb1::new(magic, exploration)))
        }
        other => Err(ConfigError::UnknownToken(other.to_string())),
    }
}

fn parse_outcome_selection(cursor: &mut Cursor<'_>) -> Result<Box<dyn OutcomeSelection>, ConfigError> {
    let name = cursor.next()?;
    match name {
        "MonteCarlo" => Ok(Box::new(MonteCarlo)),
        "UnsolvedMonteCarlo" => Ok(Box::new(UnsolvedMonteCarlo)),
        other => Err(ConfigError::UnknownToken(other.to_string())),
    }
}

fn parse_backup(cursor: &mut Cursor<'_>) -> Result<Box<dyn BackupFunction>, ConfigError> {
    match cursor.next()? {
        "LeafBackup" => Ok(Box::new(LeafBackup)),
        "MonteCarloBackup" => Ok(Box::new(MonteCarloBackup)),
        "MaxMonteCarloBackup" => Ok(Box::new(MaxMonteCarloBackup)),
        "PartialBellmanBackup" => Ok(Box::new(PartialBellmanBackup)),
        other => Err(ConfigError::UnknownToken(other.to_string())),
    }
}

fn parse_bool(cursor: &mut Cursor<'_>) -> Result<bool, ConfigError> {
    match cursor.next()? {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(ConfigError::MalformedDescriptor(format!("expected 0 or 1, found `{}`", other))),
    }
}

fn parse_u32(cursor: &mut Cursor<'_>) -> Result<u32, ConfigError> {
    let tok = cursor.next()?;
    tok.parse().map_err(|_| ConfigError::MalformedDescriptor(format!("expected an integer, found `{}`", tok)))
}

fn parse_f64(cursor: &mut Cursor<'_>) -> Result<f64, ConfigError> {
    let tok = cursor.next()?;
    tok.parse().map_err(|_| ConfigError::MalformedDescriptor(format!("expected a number, found `{}`", tok)))
}

fn parse_termination_kind<'a>(cursor: &mut Cursor<'a>) -> Result<&'a str, ConfigError> {
    match cursor.next()? {
        "TIME" => Ok("TIME"),
        "TRIALS" => Ok("TRIALS"),
        "TIME_AND_TRIALS" => Ok("TIME_AND_TRIALS"),
        other => Err(ConfigError::UnknownToken(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{CachePolicy, Evaluatable, EvaluatableKind};
    use crate::logic::ExprArena;
    use crate::state::HashParams;
    use crate::task::{ActionState, FinalRewardPolicy};

    fn trivial_task() -> Task {
        let mut arena = ExprArena::new();
        let r = arena.constant(0.0);
        let params = HashParams::disabled(0, 1);
        let initial = State::make(vec![], 2, &params);
        let reward = Evaluatable::new(0, EvaluatableKind::Reward { min: -1.0, max: 1.0, action_independent: true }, r, r, vec![0], CachePolicy::None, 0);
        Task::new("trivial".into(), 2, 1.0, initial, params, arena, 0, Vec::new(), Vec::new(), reward, Vec::new(), vec![ActionState::noop(0)], FinalRewardPolicy::Noop, false, 0).unwrap()
    }

    #[test]
    fn parses_an_explicit_thts_descriptor() {
        let task = trivial_task();
        let engine = parse_descriptor("[THTS -act [Ucb1] -out [MonteCarlo] -backup [MonteCarloBackup] -init [Uniform] -r 10]", &task, 1).unwrap();
        assert!(matches!(engine, PlannerEngine::Thts(_)));
    }

    #[test]
    fn expands_a_shortcut_name() {
        let task = trivial_task();
        let engine = parse_descriptor("IPPC2011", &task, 1).unwrap();
        assert!(matches!(engine, PlannerEngine::Thts(_)));
    }

    #[test]
    fn parses_a_simple_engine_with_common_flags() {
        let task = trivial_task();
        let engine = parse_descriptor("[DFS -uc 1]", &task, 1).unwrap();
        assert!(matches!(engine, PlannerEngine::Simple(_)));
    }

    #[test]
    fn missing_thts_ingredient_is_a_config_error() {
        let task = trivial_task();
        let err = parse_descriptor("[THTS -act [Ucb1]]", &task, 1).unwrap_err();
        assert!(matches!(err, ConfigError::MissingIngredient(_)));
    }

    #[test]
    fn unknown_engine_name_is_a_config_error() {
        let task = trivial_task();
        let err = parse_descriptor("[Bogus]", &task, 1).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEngine(_)));
    }
}
