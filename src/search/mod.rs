//! The search engine interface and the simple engines built on it.
//! THTS is the client that composes these for its leaf initializer's
//! sub-engine.

pub mod dfs;
pub mod engine;
pub mod ids;
pub mod minimal_lookahead;
pub mod random_walk;
pub mod uniform;

pub use dfs::Dfs;
pub use engine::{EngineContext, SearchEngine};
pub use ids::{Ids, IdsConfig};
pub use minimal_lookahead::MinimalLookahead;
pub use random_walk::RandomWalk;
pub use uniform::UniformEvaluation;
