//! Trial-Based Heuristic Tree Search: the anytime planner built on top
//! of [`crate::task::Task`] and [`crate::search::SearchEngine`]'s
//! simple engines, which it uses as its leaf initializer's sub-engine.

pub mod action_selection;
pub mod backup;
pub mod engine;
pub mod initializer;
pub mod node;
pub mod outcome_selection;
pub mod recommend;
pub mod termination;

pub use action_selection::{ActionSelection, ExplorationFn, Ucb1};
pub use backup::{BackupFunction, LeafBackup, MaxMonteCarloBackup, MonteCarloBackup, PartialBellmanBackup};
pub use engine::{Thts, ThtsConfig};
pub use initializer::{ExpandNode, Initializer};
pub use node::{ChanceNode, DecisionNode, Node, NodeArena, NodeCommon, NodeId};
pub use outcome_selection::{MonteCarlo, OutcomeSelection, UnsolvedMonteCarlo};
pub use recommend::Recommendation;
pub use termination::Termination;
