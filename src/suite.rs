//! Process-wide suite state
//!
//! Explicit init/teardown lifecycle tied to suite start and finish, instead
//! of hidden lazily-created globals. `initialize` may be called exactly
//! once per process; `finish` is idempotent and tears down every live
//! session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::ExecutionConfig;
use crate::errors::HarnessError;
use crate::notify::LifecycleNotifier;
use crate::session::{SessionFactory, SessionRegistry};

static SUITE: OnceCell<Suite> = OnceCell::new();

/// Shared state for one test-suite run.
#[derive(Debug)]
pub struct Suite {
    config: ExecutionConfig,
    registry: Arc<SessionRegistry>,
    started_at: DateTime<Utc>,
    finished: Mutex<bool>,
}

impl Suite {
    /// Install the process-wide suite state. Fails if already initialized.
    pub fn initialize(
        config: ExecutionConfig,
        factory: Arc<dyn SessionFactory>,
        notifier: Arc<dyn LifecycleNotifier>,
    ) -> Result<&'static Suite, HarnessError> {
        let suite = Suite {
            config,
            registry: Arc::new(SessionRegistry::with_notifier(factory, notifier)),
            started_at: Utc::now(),
            finished: Mutex::new(false),
        };

        SUITE
            .set(suite)
            .map_err(|_| HarnessError::Configuration("suite already initialized".to_string()))?;

        let suite = SUITE
            .get()
            .ok_or_else(|| HarnessError::Configuration("suite initialization raced".to_string()))?;
        info!(
            "Suite initialized at {} (browser={}, backend={})",
            suite.started_at,
            suite.config.browser(),
            suite.config.backend()
        );
        Ok(suite)
    }

    /// The installed suite state, if any.
    pub fn get() -> Option<&'static Suite> {
        SUITE.get()
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Tear down every live session. Safe to call more than once; only the
    /// first call does the work.
    pub async fn finish(&self) {
        {
            let mut finished = self.finished.lock();
            if *finished {
                debug!("Suite finish called again (no-op)");
                return;
            }
            *finished = true;
        }

        self.registry.close_all().await;
        info!("Suite finished (started at {})", self.started_at);
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::session::{Session, WorkerId};

    struct OfflineFactory;

    #[async_trait]
    impl SessionFactory for OfflineFactory {
        async fn create_session(
            &self,
            worker: &WorkerId,
            config: &ExecutionConfig,
        ) -> Result<Session, HarnessError> {
            Ok(Session::offline(worker.clone(), config))
        }
    }

    // The suite cell is process-wide, so the whole lifecycle is covered by
    // a single test.
    #[tokio::test]
    async fn test_suite_lifecycle() {
        assert!(Suite::get().is_none());

        let suite = Suite::initialize(
            ExecutionConfig::default(),
            Arc::new(OfflineFactory),
            Arc::new(crate::notify::NoopNotifier),
        )
        .unwrap();

        let err = Suite::initialize(
            ExecutionConfig::default(),
            Arc::new(OfflineFactory),
            Arc::new(crate::notify::NoopNotifier),
        )
        .unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));

        let worker = WorkerId::new("suite-worker");
        suite
            .registry()
            .acquire(&worker, suite.config())
            .await
            .unwrap();
        assert_eq!(suite.registry().session_count(), 1);

        suite.finish().await;
        assert_eq!(suite.registry().session_count(), 0);

        // Idempotent teardown.
        suite.finish().await;
    }
}
