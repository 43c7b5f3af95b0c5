//! Session lifecycle notifications
//!
//! The core invokes these callbacks synchronously at the corresponding
//! lifecycle points and never buffers, batches or retries delivery.
//! Reporting layers implement the trait to attach artifacts; persistence of
//! snapshot contents is entirely the implementor's responsibility.

use crate::config::ExecutionConfig;
use crate::errors::HarnessError;
use crate::session::{SessionSnapshot, WorkerId};

/// Observer of session lifecycle events. All methods default to no-ops so
/// implementors only override what they report on.
pub trait LifecycleNotifier: Send + Sync {
    /// A session was created for `worker`.
    fn on_session_created(&self, _worker: &WorkerId, _config: &ExecutionConfig) {}

    /// An interaction failed terminally (retries exhausted or fatal error).
    /// The snapshot was captured on demand just before this call.
    fn on_action_failed(
        &self,
        _worker: &WorkerId,
        _error: &HarnessError,
        _snapshot: &SessionSnapshot,
    ) {
    }

    /// The worker's session was torn down.
    fn on_session_closed(&self, _worker: &WorkerId) {}
}

/// Notifier that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl LifecycleNotifier for NoopNotifier {}
