//! Retry policy

use std::collections::HashSet;
use std::time::Duration;

use crate::config::ExecutionConfig;
use crate::errors::{HarnessError, TransientKind};

/// Bounds one retried interaction. `max_attempts` counts retries after the
/// initial attempt, so an always-failing action runs `max_attempts + 1`
/// times in total before the transient error is re-raised.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Fixed pause between attempts. No exponential backoff.
    pub backoff: Duration,
    /// Error classes eligible for retry.
    pub transient: HashSet<TransientKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_millis(300),
            transient: TransientKind::all(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Policy that gives every action exactly one attempt.
    pub fn no_retries() -> Self {
        Self::new(0)
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Restrict the retryable classes.
    pub fn retrying_only(mut self, transient: HashSet<TransientKind>) -> Self {
        self.transient = transient;
        self
    }

    /// Policy from configuration: `retry.count` replaces the default bound
    /// when `retry.enabled` is set; otherwise the built-in default applies.
    pub fn from_config(config: &ExecutionConfig) -> Self {
        if config.retry_enabled() {
            Self::new(config.retry_count())
        } else {
            Self::default()
        }
    }

    /// Whether this policy treats `err` as retryable.
    pub fn is_transient(&self, err: &HarnessError) -> bool {
        err.transient_kind()
            .is_some_and(|kind| self.transient.contains(&kind))
    }
}
