//! Smoke run: create one session from environment configuration, open the
//! base URL, print the title, tear down.
//!
//! Configuration comes from `BROWSER`, `HEADLESS`, `EXECUTION_TYPE`,
//! `GRID_URL`, etc. (see the config module key table). A matching driver
//! server or hub must already be running.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use webharness::config::EnvSource;
use webharness::{ExecutionConfig, NoopNotifier, Page, SessionRegistry, WebDriverBackend, WorkerId};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = webharness::init_logging();

    let config =
        ExecutionConfig::resolve(&EnvSource::new()).context("resolving execution config")?;
    info!(
        "Smoke run: browser={}, backend={}, headless={}",
        config.browser(),
        config.backend(),
        config.headless()
    );

    let registry = SessionRegistry::new(Arc::new(WebDriverBackend::new()));
    let worker = WorkerId::new("smoke-1");

    registry
        .with_session(&worker, &config, |session| async move {
            let page = Page::new(session, Arc::new(NoopNotifier));
            page.open_base_url().await?;
            info!("Opened {} (title: {})", page.current_url().await?, page.title().await?);
            Ok(())
        })
        .await
        .context("smoke interaction failed")?;

    info!("Smoke run complete");
    Ok(())
}
