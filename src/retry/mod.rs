//! Bounded retry for transient interaction failures
//!
//! A policy object decorating an action, not catch-and-loop scattered
//! through call sites. Only classified transient errors are retried; the
//! original error is always re-raised once the bound is reached.

mod policy;
mod proxy;

pub use policy::RetryPolicy;
pub use proxy::{execute_with_retry, InteractionProxy};
