//! Typed error taxonomy. `anyhow` is reserved for the two process
//! boundaries (task loading, CLI entry); everything else below that
//! returns one of these.

use thiserror::Error;

/// malformed or semantically invalid task description, detected at load
/// time. Always fatal.
#[derive(Debug, Error)]
pub enum TaskError {
 #[error("undefined fluent reference: {0}")]
 UndefinedFluent(String),
 #[error("duplicate definition of fluent: {0}")]
 DuplicateFluent(String),
 #[error("reward function is undefined")]
 MissingReward,
 #[error("reward function redefined")]
 DuplicateReward,
 #[error("malformed section `{section}`: {reason}")]
 MalformedSection { section: String, reason: String },
 #[error("candidate action index {0} out of range for BEST_OF_CANDIDATE_SET")]
 InvalidCandidate(usize),
 #[error("goal-test action index {0} out of range")]
 InvalidGoalAction(usize),
 #[error(transparent)]
 Io(#[from] std::io::Error),
}

/// malformed CLI/engine descriptor, detected while parsing it. Always
/// fatal; reported with the offending fragment.
#[derive(Debug, Error)]
pub enum ConfigError {
 #[error("unknown flag: {0}")]
 UnknownFlag(String),
 #[error("unknown engine name: {0}")]
 UnknownEngine(String),
 #[error("THTS requires all four ingredients (action selection, outcome selection, backup, initializer); missing {0}")]
 MissingIngredient(&'static str),
 #[error("malformed descriptor fragment: {0}")]
 MalformedDescriptor(String),
 #[error("unknown token: {0}")]
 UnknownToken(String),
}

/// umbrella error for the two boundaries above plus I/O.
#[derive(Debug, Error)]
pub enum EngineError {
 #[error(transparent)]
 Task(#[from] TaskError),
 #[error(transparent)]
 Config(#[from] ConfigError),
 #[error(transparent)]
 Io(#[from] std::io::Error),
}
