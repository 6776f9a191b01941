//! The task model: fluents, CPFs, action states, and the operations a
//! search engine drives the task through, plus the loader that reads a
//! task description off disk.

pub mod fluent;
pub mod loader;
pub mod model;

pub use fluent::{ActionState, Fluent, FluentKind};
pub use loader::load_task;
pub use model::{FinalRewardPolicy, Task};
