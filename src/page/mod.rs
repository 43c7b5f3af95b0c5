//! Robust page interactions
//!
//! The surface page-object code builds on: every lookup goes through the
//! wait engine and every state-changing interaction goes through the
//! retrying proxy, so transient browser-state errors (stale references,
//! intercepted clicks, not-yet-rendered elements) heal without leaking into
//! test code.

use std::sync::Arc;

use serde_json::Value;
use thirtyfour::{By, WebElement};
use tracing::{debug, info};

use crate::errors::HarnessError;
use crate::notify::LifecycleNotifier;
use crate::retry::{InteractionProxy, RetryPolicy};
use crate::session::Session;
use crate::wait::{self, WaitSpec};

/// Interaction helper bound to one session.
pub struct Page {
    session: Arc<Session>,
    notifier: Arc<dyn LifecycleNotifier>,
    proxy: InteractionProxy,
    wait: WaitSpec,
}

impl Page {
    /// Build a page helper with the session's configured explicit wait and
    /// the default retry policy.
    pub fn new(session: Arc<Session>, notifier: Arc<dyn LifecycleNotifier>) -> Self {
        let wait = WaitSpec::new(std::time::Duration::from_secs(
            session.timeouts().explicit_wait_secs,
        ));
        let proxy = InteractionProxy::new(session.clone(), notifier.clone());
        Self {
            session,
            notifier,
            proxy,
            wait,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.proxy =
            InteractionProxy::with_policy(self.session.clone(), self.notifier.clone(), policy);
        self
    }

    pub fn with_wait(mut self, wait: WaitSpec) -> Self {
        self.wait = wait;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Navigate to a URL and wait for the document to settle.
    pub async fn open(&self, url: &str) -> Result<(), HarnessError> {
        info!("Navigating to URL: {}", url);
        self.session.navigate(url).await?;
        self.wait_for_ready().await
    }

    /// Open the configured base URL.
    pub async fn open_base_url(&self) -> Result<(), HarnessError> {
        let url = self.session.base_url().to_string();
        self.open(&url).await
    }

    /// Wait until `document.readyState` is `complete`.
    pub async fn wait_for_ready(&self) -> Result<(), HarnessError> {
        debug!("Waiting for document.readyState == complete");
        let session = self.session.as_ref();
        wait::wait_until(&self.wait, || async move {
            let state = session
                .execute_script("return document.readyState;", Vec::new())
                .await?;
            Ok((state.as_str() == Some("complete")).then_some(()))
        })
        .await
    }

    pub async fn title(&self) -> Result<String, HarnessError> {
        self.session.title().await
    }

    pub async fn current_url(&self) -> Result<String, HarnessError> {
        self.session.current_url().await
    }

    /// Wait for the element to become visible and return it.
    pub async fn wait_visible(&self, by: By) -> Result<WebElement, HarnessError> {
        wait::visible(&self.session, by, &self.wait).await
    }

    /// Wait for the element to become clickable and return it.
    pub async fn wait_clickable(&self, by: By) -> Result<WebElement, HarnessError> {
        wait::clickable(&self.session, by, &self.wait).await
    }

    /// All elements matching the locator, without waiting.
    pub async fn find_all(&self, by: By) -> Result<Vec<WebElement>, HarnessError> {
        self.session.find_all(by).await
    }

    /// Click the element once it is clickable, retrying transient failures.
    pub async fn click(&self, by: By) -> Result<(), HarnessError> {
        info!("Clicking on element: {:?}", by);
        let session = self.session.as_ref();
        let wait = &self.wait;
        self.proxy
            .retrying_execute(move || {
                let by = by.clone();
                async move {
                    let element = wait::clickable(session, by, wait).await?;
                    element.click().await.map_err(HarnessError::from_webdriver)
                }
            })
            .await
    }

    /// Type into the element once it is visible, retrying transient
    /// failures.
    pub async fn type_into(&self, by: By, text: &str) -> Result<(), HarnessError> {
        info!("Typing into element {:?} ({} chars)", by, text.len());
        let session = self.session.as_ref();
        let wait = &self.wait;
        self.proxy
            .retrying_execute(move || {
                let by = by.clone();
                async move {
                    let element = wait::visible(session, by, wait).await?;
                    element
                        .send_keys(text)
                        .await
                        .map_err(HarnessError::from_webdriver)
                }
            })
            .await
    }

    /// Clear the element then type the provided text.
    pub async fn clear_and_type(&self, by: By, text: &str) -> Result<(), HarnessError> {
        info!("Clear and type into element {:?}", by);
        let session = self.session.as_ref();
        let wait = &self.wait;
        self.proxy
            .retrying_execute(move || {
                let by = by.clone();
                async move {
                    let element = wait::visible(session, by, wait).await?;
                    element.clear().await.map_err(HarnessError::from_webdriver)?;
                    element
                        .send_keys(text)
                        .await
                        .map_err(HarnessError::from_webdriver)
                }
            })
            .await
    }

    /// Visible text of the element.
    pub async fn text_of(&self, by: By) -> Result<String, HarnessError> {
        let element = self.wait_visible(by).await?;
        element.text().await.map_err(HarnessError::from_webdriver)
    }

    /// Attribute value of the element, if present.
    pub async fn attr_of(&self, by: By, name: &str) -> Result<Option<String>, HarnessError> {
        let element = self.wait_visible(by).await?;
        element.attr(name).await.map_err(HarnessError::from_webdriver)
    }

    /// Scroll the element into the center of the viewport.
    pub async fn scroll_into_view(&self, by: By) -> Result<(), HarnessError> {
        debug!("Scrolling into view: {:?}", by);
        let element = self.wait_visible(by).await?;
        self.session
            .execute_script(
                "arguments[0].scrollIntoView({block:'center',inline:'center'});",
                vec![element_arg(&element)?],
            )
            .await?;
        Ok(())
    }

    /// JS click for elements that refuse a native click.
    pub async fn js_click(&self, by: By) -> Result<(), HarnessError> {
        info!("Performing JS click on: {:?}", by);
        let element = self.wait_visible(by).await?;
        self.session
            .execute_script("arguments[0].click();", vec![element_arg(&element)?])
            .await?;
        Ok(())
    }

    /// Move the pointer over the element.
    pub async fn hover(&self, by: By) -> Result<(), HarnessError> {
        info!("Hovering over element: {:?}", by);
        let element = self.wait_visible(by).await?;
        self.session.hover(&element).await
    }
}

fn element_arg(element: &WebElement) -> Result<Value, HarnessError> {
    element.to_json().map_err(HarnessError::from_webdriver)
}
