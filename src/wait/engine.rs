//! Generic polling primitive

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::config::ExecutionConfig;
use crate::errors::{HarnessError, TransientKind};

/// Parameters of one wait call. Stateless: a spec can be reused across
/// calls, each call polls independently.
#[derive(Debug, Clone)]
pub struct WaitSpec {
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Transient classes the predicate may raise that count as "not yet
    /// satisfied" instead of aborting the wait.
    pub ignored: HashSet<TransientKind>,
}

impl Default for WaitSpec {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            poll_interval: Duration::from_millis(500),
            ignored: TransientKind::all(),
        }
    }
}

impl WaitSpec {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Spec with the configured explicit wait as timeout.
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(Duration::from_secs(config.explicit_wait_secs()))
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Replace the ignored set entirely.
    pub fn ignoring(mut self, ignored: HashSet<TransientKind>) -> Self {
        self.ignored = ignored;
        self
    }
}

/// Poll `probe` until it yields a value, a non-ignored error, or the
/// timeout elapses.
///
/// The probe signals "not yet satisfied" by returning `Ok(None)` or by
/// raising an error whose transient class is in `spec.ignored`; any other
/// error aborts the wait immediately. A satisfied probe returns its value
/// at once — no extra poll cycles. On timeout, the last observed failure
/// (if any) is carried in the error for diagnostics.
pub async fn wait_until<T, F, Fut>(spec: &WaitSpec, mut probe: F) -> Result<T, HarnessError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, HarnessError>>,
{
    let started = Instant::now();
    let mut last_error: Option<String> = None;

    loop {
        match probe().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {
                trace!("Wait predicate not yet satisfied");
            }
            Err(err) => match err.transient_kind() {
                Some(kind) if spec.ignored.contains(&kind) => {
                    trace!("Ignoring {} during wait: {}", kind, err);
                    last_error = Some(err.to_string());
                }
                _ => return Err(err),
            },
        }

        if started.elapsed() >= spec.timeout {
            return Err(HarnessError::Timeout {
                waited_ms: started.elapsed().as_millis() as u64,
                last_error,
            });
        }
        tokio::time::sleep(spec.poll_interval).await;
    }
}
