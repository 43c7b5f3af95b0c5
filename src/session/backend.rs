//! Backend resolution and session creation
//!
//! Turns a resolved configuration into a live WebDriver session against a
//! local driver server, a grid hub, or a cloud provider hub. Driver-binary
//! provisioning is an external collaborator's job; "local" connects to an
//! already-running driver server.

use std::time::Duration;

use async_trait::async_trait;
use thirtyfour::WebDriver;
use tracing::{info, warn};

use super::{build_capabilities, Session, WorkerId};
use crate::config::{validate_hub_url, BackendKind, ExecutionConfig};
use crate::errors::HarnessError;

/// Creates sessions for the registry. Implemented by [`WebDriverBackend`]
/// for real browsers; test suites can substitute their own factory.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create_session(
        &self,
        worker: &WorkerId,
        config: &ExecutionConfig,
    ) -> Result<Session, HarnessError>;
}

/// Production factory speaking the WebDriver protocol via thirtyfour.
#[derive(Debug, Default)]
pub struct WebDriverBackend;

impl WebDriverBackend {
    pub fn new() -> Self {
        Self
    }

    /// Endpoint the session will be created against. For remote backends
    /// the hub URL is validated here, before any network attempt.
    fn endpoint(config: &ExecutionConfig) -> Result<String, HarnessError> {
        match config.backend() {
            BackendKind::Local => Ok(config.local_url().to_string()),
            BackendKind::Grid | BackendKind::Cloud => {
                validate_hub_url(config.hub_url())?;
                Ok(config.hub_url().to_string())
            }
        }
    }
}

#[async_trait]
impl SessionFactory for WebDriverBackend {
    async fn create_session(
        &self,
        worker: &WorkerId,
        config: &ExecutionConfig,
    ) -> Result<Session, HarnessError> {
        let capabilities = build_capabilities(config)?;
        let endpoint = Self::endpoint(config)?;

        info!(
            "Creating {} session for worker {}: browser={}, headless={}, endpoint={}",
            config.backend(),
            worker,
            config.browser(),
            config.headless(),
            endpoint
        );

        let driver = WebDriver::new(&endpoint, capabilities)
            .await
            .map_err(|e| HarnessError::SessionCreation(e.to_string()))?;

        // Headless and non-GUI backends may not support this.
        if let Err(e) = driver.maximize_window().await {
            warn!("Could not maximize window (might be headless/non-GUI): {}", e);
        }

        driver
            .set_implicit_wait_timeout(Duration::from_secs(config.implicit_wait_secs()))
            .await
            .map_err(|e| HarnessError::SessionCreation(format!("failed to set implicit wait: {e}")))?;

        // Floor at 30s so slow page loads are not aborted by a short
        // explicit-wait setting.
        let page_load = config.page_load_timeout_secs().max(30);
        driver
            .set_page_load_timeout(Duration::from_secs(page_load))
            .await
            .map_err(|e| {
                HarnessError::SessionCreation(format!("failed to set page load timeout: {e}"))
            })?;

        Ok(Session::new(worker.clone(), config, driver))
    }
}
