//! Worker-keyed session registry
//!
//! Owns the mapping from logical worker identity to live session and
//! enforces exactly one session per worker. Initialization is double
//! checked per worker key: the registry map is only locked for entry
//! access, and session creation itself runs unsynchronized with respect to
//! other workers.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{Session, SessionFactory};
use crate::config::ExecutionConfig;
use crate::errors::HarnessError;
use crate::notify::{LifecycleNotifier, NoopNotifier};

/// Logical execution unit running one test at a time. Maps to whatever the
/// runner parallelizes over (a task, a thread id, a shard name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for WorkerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Registry of live sessions, one per worker.
pub struct SessionRegistry {
    sessions: DashMap<WorkerId, Arc<OnceCell<Arc<Session>>>>,
    factory: Arc<dyn SessionFactory>,
    notifier: Arc<dyn LifecycleNotifier>,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self::with_notifier(factory, Arc::new(NoopNotifier))
    }

    pub fn with_notifier(
        factory: Arc<dyn SessionFactory>,
        notifier: Arc<dyn LifecycleNotifier>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            factory,
            notifier,
        }
    }

    /// Get the worker's session, creating it on first call.
    ///
    /// Idempotent per worker: a second call returns the same session
    /// unchanged and ignores `config` — release first to reconfigure. Only
    /// one initialization ever runs per worker key.
    pub async fn acquire(
        &self,
        worker: &WorkerId,
        config: &ExecutionConfig,
    ) -> Result<Arc<Session>, HarnessError> {
        let cell = self
            .sessions
            .entry(worker.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_try_init(|| async {
                info!("Initializing session for worker {}", worker);
                let session = Arc::new(self.factory.create_session(worker, config).await?);
                self.notifier.on_session_created(worker, config);
                Ok::<_, HarnessError>(session)
            })
            .await;

        match result {
            Ok(session) => Ok(session.clone()),
            Err(e) => {
                // Drop the empty cell so the next acquire retries cleanly.
                self.sessions.remove_if(worker, |_, cell| cell.get().is_none());
                Err(e)
            }
        }
    }

    /// The worker's live session, if any.
    pub fn current(&self, worker: &WorkerId) -> Option<Arc<Session>> {
        self.sessions
            .get(worker)
            .and_then(|cell| cell.get().cloned())
    }

    /// Tear down the worker's session and remove it from the registry.
    ///
    /// Teardown is best-effort: failures are logged, never propagated, so
    /// they cannot mask the real test outcome. Releasing a worker with no
    /// session is a no-op.
    pub async fn release(&self, worker: &WorkerId) {
        let Some((_, cell)) = self.sessions.remove(worker) else {
            debug!("Release for worker {} with no session (no-op)", worker);
            return;
        };

        if let Some(session) = cell.get() {
            if let Err(e) = session.close().await {
                warn!("Error closing session {} for worker {}: {}", session.id(), worker, e);
            }
            self.notifier.on_session_closed(worker);
        }
    }

    /// Scoped acquisition: run `f` against the worker's session and release
    /// it on every exit path, success or error.
    pub async fn with_session<T, F, Fut>(
        &self,
        worker: &WorkerId,
        config: &ExecutionConfig,
        f: F,
    ) -> Result<T, HarnessError>
    where
        F: FnOnce(Arc<Session>) -> Fut,
        Fut: Future<Output = Result<T, HarnessError>>,
    {
        let session = self.acquire(worker, config).await?;
        let result = f(session).await;
        self.release(worker).await;
        result
    }

    /// Number of workers with a live session.
    pub fn session_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .count()
    }

    /// Release every live session in parallel. Used at suite teardown.
    pub async fn close_all(&self) {
        let workers: Vec<WorkerId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        if workers.is_empty() {
            return;
        }

        join_all(workers.iter().map(|worker| self.release(worker))).await;
        info!("All sessions released ({} workers)", workers.len());
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::session::SessionSnapshot;

    /// Factory that hands out driverless sessions, optionally failing the
    /// first N creations.
    #[derive(Default)]
    struct StubFactory {
        failures_remaining: AtomicU32,
        created: AtomicU32,
    }

    impl StubFactory {
        fn failing_first(n: u32) -> Self {
            Self {
                failures_remaining: AtomicU32::new(n),
                created: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SessionFactory for StubFactory {
        async fn create_session(
            &self,
            worker: &WorkerId,
            config: &ExecutionConfig,
        ) -> Result<Session, HarnessError> {
            if self.failures_remaining.load(Ordering::SeqCst) > 0 {
                self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
                return Err(HarnessError::SessionCreation("stub backend down".to_string()));
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Session::offline(worker.clone(), config))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl LifecycleNotifier for RecordingNotifier {
        fn on_session_created(&self, worker: &WorkerId, _config: &ExecutionConfig) {
            self.events.lock().push(format!("created:{worker}"));
        }

        fn on_action_failed(
            &self,
            worker: &WorkerId,
            error: &HarnessError,
            _snapshot: &SessionSnapshot,
        ) {
            self.events.lock().push(format!("failed:{worker}:{error}"));
        }

        fn on_session_closed(&self, worker: &WorkerId) {
            self.events.lock().push(format!("closed:{worker}"));
        }
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(StubFactory::default()))
    }

    #[tokio::test]
    async fn test_acquire_is_idempotent_per_worker() {
        let registry = registry();
        let worker = WorkerId::new("w-1");
        let config = ExecutionConfig::default();

        let first = registry.acquire(&worker, &config).await.unwrap();
        let second = registry.acquire(&worker, &config).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.session_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_workers_get_distinct_sessions() {
        let registry = Arc::new(registry());
        let config = ExecutionConfig::default();

        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let registry = registry.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    let worker = WorkerId::new(format!("w-{i}"));
                    let session = registry.acquire(&worker, &config).await.unwrap();
                    assert_eq!(session.worker(), &worker);
                    session.id().to_string()
                })
            })
            .collect();

        let mut ids: Vec<String> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4, "each worker must own a distinct session");
        assert_eq!(registry.session_count(), 4);
    }

    #[tokio::test]
    async fn test_workers_never_observe_each_others_sessions() {
        let registry = Arc::new(registry());
        let config = ExecutionConfig::default();

        let tasks: Vec<_> = (0..2)
            .map(|i| {
                let registry = registry.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    let worker = WorkerId::new(format!("w-{i}"));
                    let mine = registry.acquire(&worker, &config).await.unwrap();
                    for _ in 0..50 {
                        let current = registry.current(&worker).expect("session must stay live");
                        assert!(Arc::ptr_eq(&mine, &current));
                        tokio::task::yield_now().await;
                    }
                    mine.id().to_string()
                })
            })
            .collect();

        let ids: Vec<String> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();
        assert_ne!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn test_release_then_acquire_yields_fresh_session() {
        let registry = registry();
        let worker = WorkerId::new("w-1");
        let config = ExecutionConfig::default();

        let first = registry.acquire(&worker, &config).await.unwrap();
        registry.release(&worker).await;
        let second = registry.acquire(&worker, &config).await.unwrap();

        assert_ne!(first.id(), second.id());
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_release_without_session_is_a_noop() {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry =
            SessionRegistry::with_notifier(Arc::new(StubFactory::default()), notifier.clone());

        registry.release(&WorkerId::new("ghost")).await;
        assert!(notifier.events().is_empty());
    }

    #[tokio::test]
    async fn test_current_reflects_lifecycle() {
        let registry = registry();
        let worker = WorkerId::new("w-1");
        let config = ExecutionConfig::default();

        assert!(registry.current(&worker).is_none());
        registry.acquire(&worker, &config).await.unwrap();
        assert!(registry.current(&worker).is_some());
        registry.release(&worker).await;
        assert!(registry.current(&worker).is_none());
    }

    #[tokio::test]
    async fn test_failed_creation_is_retried_on_next_acquire() {
        let factory = Arc::new(StubFactory::failing_first(1));
        let registry = SessionRegistry::new(factory.clone());
        let worker = WorkerId::new("w-1");
        let config = ExecutionConfig::default();

        let err = registry.acquire(&worker, &config).await.unwrap_err();
        assert!(matches!(err, HarnessError::SessionCreation(_)));
        assert!(registry.current(&worker).is_none());

        registry.acquire(&worker, &config).await.unwrap();
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_session_releases_on_error_path() {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry =
            SessionRegistry::with_notifier(Arc::new(StubFactory::default()), notifier.clone());
        let worker = WorkerId::new("w-1");
        let config = ExecutionConfig::default();

        let result: Result<(), _> = registry
            .with_session(&worker, &config, |_session| async {
                Err(HarnessError::Driver("boom".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert!(registry.current(&worker).is_none());
        assert_eq!(
            notifier.events(),
            vec!["created:w-1".to_string(), "closed:w-1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_close_all_releases_every_worker() {
        let registry = registry();
        let config = ExecutionConfig::default();

        for i in 0..3 {
            registry
                .acquire(&WorkerId::new(format!("w-{i}")), &config)
                .await
                .unwrap();
        }
        assert_eq!(registry.session_count(), 3);

        registry.close_all().await;
        assert_eq!(registry.session_count(), 0);
    }
}
