//! Retrying action execution

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::RetryPolicy;
use crate::errors::HarnessError;
use crate::notify::LifecycleNotifier;
use crate::session::Session;

/// Run `action` under `policy`.
///
/// Attempt counter starts at zero; each transient failure increments it and
/// pauses for the fixed backoff before the next attempt. Once the counter
/// exceeds `max_attempts` — or on the first non-transient error — the
/// original error is re-raised unchanged.
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut action: F,
) -> Result<T, HarnessError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HarnessError>>,
{
    let mut attempts: u32 = 0;
    loop {
        match action().await {
            Ok(value) => {
                debug!("Action succeeded on attempt {}", attempts + 1);
                return Ok(value);
            }
            Err(err) if policy.is_transient(&err) => {
                attempts += 1;
                if attempts > policy.max_attempts {
                    error!("Retry exhausted after {} attempts: {}", attempts, err);
                    return Err(err);
                }
                warn!(
                    "Transient interaction error, retrying {}/{}: {}",
                    attempts, policy.max_attempts, err
                );
                tokio::time::sleep(policy.backoff).await;
            }
            Err(err) => {
                error!("Non-retryable interaction error: {}", err);
                return Err(err);
            }
        }
    }
}

/// Session-bound retrying executor. On terminal failure it captures a
/// diagnostic snapshot and notifies the lifecycle observer before
/// re-raising the original error.
pub struct InteractionProxy {
    session: Arc<Session>,
    notifier: Arc<dyn LifecycleNotifier>,
    policy: RetryPolicy,
}

impl InteractionProxy {
    pub fn new(session: Arc<Session>, notifier: Arc<dyn LifecycleNotifier>) -> Self {
        Self::with_policy(session, notifier, RetryPolicy::default())
    }

    pub fn with_policy(
        session: Arc<Session>,
        notifier: Arc<dyn LifecycleNotifier>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            session,
            notifier,
            policy,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `action` under this proxy's policy.
    pub async fn retrying_execute<T, F, Fut>(&self, action: F) -> Result<T, HarnessError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HarnessError>>,
    {
        self.retrying_execute_with(&self.policy, action).await
    }

    /// Run `action` under a call-site policy override.
    pub async fn retrying_execute_with<T, F, Fut>(
        &self,
        policy: &RetryPolicy,
        action: F,
    ) -> Result<T, HarnessError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HarnessError>>,
    {
        match execute_with_retry(policy, action).await {
            Ok(value) => Ok(value),
            Err(err) => {
                let snapshot = self.session.snapshot().await;
                self.notifier
                    .on_action_failed(self.session.worker(), &err, &snapshot);
                Err(err)
            }
        }
    }
}
