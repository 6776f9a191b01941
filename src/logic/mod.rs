//! The logical expression tree and its evaluators.

pub mod domain;
pub mod eval;
pub mod expr;

pub use domain::{DomainEnv, Interval};
pub use eval::{Env, KleeneEnv};
pub use expr::{Expr, ExprArena, ExprId};
