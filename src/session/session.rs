//! A live, exclusively-owned browser session
//!
//! Wraps the WebDriver handle behind `RwLock<Option<..>>` so that release
//! can take ownership for teardown and any later operation fails with a
//! session-closed error instead of touching a dead handle.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thirtyfour::prelude::*;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::WorkerId;
use crate::config::{BackendKind, ExecutionConfig};
use crate::errors::HarnessError;

/// Timeouts copied from the configuration at session creation. Later
/// configuration changes never affect an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveTimeouts {
    pub implicit_wait_secs: u64,
    pub explicit_wait_secs: u64,
    pub page_load_timeout_secs: u64,
}

impl EffectiveTimeouts {
    pub(crate) fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            implicit_wait_secs: config.implicit_wait_secs(),
            explicit_wait_secs: config.explicit_wait_secs(),
            page_load_timeout_secs: config.page_load_timeout_secs(),
        }
    }
}

/// Serializable view of a session, for collaborators.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub worker: String,
    pub backend: BackendKind,
    pub created_at: DateTime<Utc>,
    pub open: bool,
    pub interaction_count: u64,
    pub error_count: u64,
}

/// On-demand diagnostic capture. The core produces it; persisting any of it
/// is the notifier implementation's responsibility.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub worker: String,
    pub captured_at: DateTime<Utc>,
    pub current_url: Option<String>,
    pub page_source: Option<String>,
    #[serde(skip)]
    pub screenshot_png: Option<Vec<u8>>,
}

impl SessionSnapshot {
    /// Screenshot as base64, for inline report attachments.
    pub fn screenshot_base64(&self) -> Option<String> {
        self.screenshot_png
            .as_ref()
            .map(|png| base64::engine::general_purpose::STANDARD.encode(png))
    }
}

/// One live browser automation handle, bound to a single worker.
pub struct Session {
    /// Short unique session ID (display name)
    id: String,
    worker: WorkerId,
    backend: BackendKind,
    driver: RwLock<Option<WebDriver>>,
    created_at: DateTime<Utc>,
    timeouts: EffectiveTimeouts,
    /// Base URL copied from config, consumed by the page layer.
    base_url: String,
    interaction_count: AtomicU64,
    error_count: AtomicU64,
}

impl Session {
    /// Wrap a freshly created driver handle. Called by session factories.
    pub fn new(worker: WorkerId, config: &ExecutionConfig, driver: WebDriver) -> Self {
        let id = format!("session-{}", &Uuid::new_v4().to_string()[..8]);
        info!("Session {} bound to worker {} ({} backend)", id, worker, config.backend());
        Self {
            id,
            worker,
            backend: config.backend(),
            driver: RwLock::new(Some(driver)),
            created_at: Utc::now(),
            timeouts: EffectiveTimeouts::from_config(config),
            base_url: config.base_url().to_string(),
            interaction_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
        }
    }

    /// Driverless session for registry-level tests.
    #[cfg(test)]
    pub(crate) fn offline(worker: WorkerId, config: &ExecutionConfig) -> Self {
        Self {
            id: format!("session-{}", &Uuid::new_v4().to_string()[..8]),
            worker,
            backend: config.backend(),
            driver: RwLock::new(None),
            created_at: Utc::now(),
            timeouts: EffectiveTimeouts::from_config(config),
            base_url: config.base_url().to_string(),
            interaction_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn worker(&self) -> &WorkerId {
        &self.worker
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn timeouts(&self) -> EffectiveTimeouts {
        self.timeouts
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn interaction_count(&self) -> u64 {
        self.interaction_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Whether the underlying driver handle is still attached.
    pub async fn is_open(&self) -> bool {
        self.driver.read().await.is_some()
    }

    pub async fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            worker: self.worker.to_string(),
            backend: self.backend,
            created_at: self.created_at,
            open: self.is_open().await,
            interaction_count: self.interaction_count(),
            error_count: self.error_count(),
        }
    }

    fn track<T>(&self, result: Result<T, HarnessError>) -> Result<T, HarnessError> {
        self.interaction_count.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Navigate to a URL.
    pub async fn navigate(&self, url: &str) -> Result<(), HarnessError> {
        let guard = self.driver.read().await;
        let driver = guard
            .as_ref()
            .ok_or_else(|| HarnessError::SessionClosed(self.id.clone()))?;

        debug!("Session {} navigating to: {}", self.id, url);
        self.track(driver.goto(url).await.map_err(HarnessError::from_webdriver))
    }

    /// Current URL.
    pub async fn current_url(&self) -> Result<String, HarnessError> {
        let guard = self.driver.read().await;
        let driver = guard
            .as_ref()
            .ok_or_else(|| HarnessError::SessionClosed(self.id.clone()))?;

        self.track(
            driver
                .current_url()
                .await
                .map(|u| u.to_string())
                .map_err(HarnessError::from_webdriver),
        )
    }

    /// Current page title.
    pub async fn title(&self) -> Result<String, HarnessError> {
        let guard = self.driver.read().await;
        let driver = guard
            .as_ref()
            .ok_or_else(|| HarnessError::SessionClosed(self.id.clone()))?;

        self.track(driver.title().await.map_err(HarnessError::from_webdriver))
    }

    /// Find a single element. "No such element" classifies as a transient
    /// error so waits and retries can absorb it.
    pub async fn find(&self, by: By) -> Result<WebElement, HarnessError> {
        let guard = self.driver.read().await;
        let driver = guard
            .as_ref()
            .ok_or_else(|| HarnessError::SessionClosed(self.id.clone()))?;

        self.track(driver.find(by).await.map_err(HarnessError::from_webdriver))
    }

    /// Find all matching elements (may be empty, does not wait).
    pub async fn find_all(&self, by: By) -> Result<Vec<WebElement>, HarnessError> {
        let guard = self.driver.read().await;
        let driver = guard
            .as_ref()
            .ok_or_else(|| HarnessError::SessionClosed(self.id.clone()))?;

        self.track(driver.find_all(by).await.map_err(HarnessError::from_webdriver))
    }

    /// Execute synchronous JavaScript and return its JSON result.
    pub async fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value, HarnessError> {
        let guard = self.driver.read().await;
        let driver = guard
            .as_ref()
            .ok_or_else(|| HarnessError::SessionClosed(self.id.clone()))?;

        self.track(
            driver
                .execute(script, args)
                .await
                .map(|ret| ret.json().clone())
                .map_err(HarnessError::from_webdriver),
        )
    }

    /// Move the pointer over an element.
    pub async fn hover(&self, element: &WebElement) -> Result<(), HarnessError> {
        let guard = self.driver.read().await;
        let driver = guard
            .as_ref()
            .ok_or_else(|| HarnessError::SessionClosed(self.id.clone()))?;

        self.track(
            driver
                .action_chain()
                .move_to_element_center(element)
                .perform()
                .await
                .map_err(HarnessError::from_webdriver),
        )
    }

    /// Full page markup.
    pub async fn page_source(&self) -> Result<String, HarnessError> {
        let guard = self.driver.read().await;
        let driver = guard
            .as_ref()
            .ok_or_else(|| HarnessError::SessionClosed(self.id.clone()))?;

        self.track(driver.source().await.map_err(HarnessError::from_webdriver))
    }

    /// Screenshot of the current viewport as PNG bytes.
    pub async fn screenshot_png(&self) -> Result<Vec<u8>, HarnessError> {
        let guard = self.driver.read().await;
        let driver = guard
            .as_ref()
            .ok_or_else(|| HarnessError::SessionClosed(self.id.clone()))?;

        self.track(
            driver
                .screenshot_as_png()
                .await
                .map_err(HarnessError::from_webdriver),
        )
    }

    /// Capture a best-effort diagnostic snapshot. Each part that cannot be
    /// captured is left empty rather than failing the capture.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let mut snapshot = SessionSnapshot {
            session_id: self.id.clone(),
            worker: self.worker.to_string(),
            captured_at: Utc::now(),
            current_url: None,
            page_source: None,
            screenshot_png: None,
        };

        let guard = self.driver.read().await;
        let Some(driver) = guard.as_ref() else {
            debug!("Session {} snapshot requested after close", self.id);
            return snapshot;
        };

        match driver.current_url().await {
            Ok(url) => snapshot.current_url = Some(url.to_string()),
            Err(e) => debug!("Session {} snapshot: no URL: {}", self.id, e),
        }
        match driver.source().await {
            Ok(source) => snapshot.page_source = Some(source),
            Err(e) => debug!("Session {} snapshot: no page source: {}", self.id, e),
        }
        match driver.screenshot_as_png().await {
            Ok(png) => snapshot.screenshot_png = Some(png),
            Err(e) => debug!("Session {} snapshot: no screenshot: {}", self.id, e),
        }

        snapshot
    }

    /// Terminate the underlying driver session. Idempotent: closing an
    /// already-closed session is a no-op.
    pub async fn close(&self) -> Result<(), HarnessError> {
        let mut guard = self.driver.write().await;
        if let Some(driver) = guard.take() {
            driver
                .quit()
                .await
                .map_err(|e| HarnessError::Driver(e.to_string()))?;
            info!("Session {} closed", self.id);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("worker", &self.worker)
            .field("backend", &self.backend)
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionConfig;

    fn offline_session() -> Session {
        Session::offline(WorkerId::new("w-1"), &ExecutionConfig::default())
    }

    #[tokio::test]
    async fn test_operations_on_closed_session_fail_with_session_closed() {
        let session = offline_session();
        assert!(!session.is_open().await);

        let err = session.navigate("https://example.com").await.unwrap_err();
        assert!(matches!(err, HarnessError::SessionClosed(_)));

        let err = session.title().await.unwrap_err();
        assert!(matches!(err, HarnessError::SessionClosed(_)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let session = offline_session();
        session.close().await.unwrap();
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_of_closed_session_is_empty_but_succeeds() {
        let session = offline_session();
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.session_id, session.id());
        assert!(snapshot.current_url.is_none());
        assert!(snapshot.page_source.is_none());
        assert!(snapshot.screenshot_base64().is_none());
    }

    #[tokio::test]
    async fn test_timeouts_are_copied_from_config() {
        let session = offline_session();
        let timeouts = session.timeouts();
        assert_eq!(timeouts.explicit_wait_secs, 20);
        assert_eq!(timeouts.page_load_timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_failed_operations_are_counted() {
        let session = offline_session();
        // SessionClosed is raised before the driver call, so counters stay
        // untouched for a closed session.
        let _ = session.navigate("https://example.com").await;
        assert_eq!(session.interaction_count(), 0);
    }
}
