//! Predicate-polling wait engine
//!
//! Blocking (task-occupying) waits with timeout and a configurable set of
//! ignored transient errors. The canonical element conditions are built on
//! the same generic primitive.

mod conditions;
mod engine;

pub use conditions::{clickable, visible};
pub use engine::{wait_until, WaitSpec};
