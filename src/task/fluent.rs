//! Fluents and ground joint actions.

use crate::Value;

/// which of the three fluent kinds a variable is. State and
/// action fluents each have their own zero-based index space; a
/// non-fluent is an instance constant fixed for the task's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluentKind {
 State,
 Action,
 NonFluent,
}

/// a named, ground fluent with a stable index and an ordered,
/// numeric-coded domain ("bools map to {0,1}").
#[derive(Debug, Clone)]
pub struct Fluent {
 pub index: usize,
 pub name: String,
 pub kind: FluentKind,
 pub domain_size: usize,
}

/// a ground joint action: which action fluents are true, plus the
/// preconditions it can possibly violate.
#[derive(Debug, Clone)]
pub struct ActionState {
 pub index: usize,
 pub values: Vec<Value>,
 /// indices of action fluents set to a nonzero (true) value.
 pub scheduled: Vec<usize>,
 /// indices into `Task::preconditions` that mention a scheduled
 /// fluent and therefore need checking for this action.
 pub relevant_preconditions: Vec<usize>,
}

impl ActionState {
 pub fn noop(num_action_fluents: usize) -> Self {
 Self {
 index: 0,
 values: vec![0.0; num_action_fluents],
 scheduled: Vec::new(),
 relevant_preconditions: Vec::new(),
 }
 }

 pub fn is_noop(&self) -> bool {
 self.scheduled.is_empty()
 }
}
