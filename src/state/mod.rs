//! State and hash-key machinery.

pub mod concrete;
pub mod hashkeys;
pub mod kleene;
pub mod pdstate;

pub use concrete::State;
pub use hashkeys::HashParams;
pub use kleene::KleeneState;
pub use pdstate::{DiscretePD, PDSlot, PDState};
