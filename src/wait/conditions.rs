//! Canonical element conditions
//!
//! Both conditions are thin probes over [`wait_until`]: look the element up
//! fresh on every poll so stale references heal themselves, then check the
//! element state.

use thirtyfour::{By, WebElement};
use tracing::debug;

use super::{wait_until, WaitSpec};
use crate::errors::HarnessError;
use crate::session::Session;

/// Wait until the element located by `by` is displayed, and return it.
pub async fn visible(
    session: &Session,
    by: By,
    spec: &WaitSpec,
) -> Result<WebElement, HarnessError> {
    debug!("Waiting for element to be visible: {:?}", by);
    wait_until(spec, || {
        let by = by.clone();
        async move {
            let element = session.find(by).await?;
            if element
                .is_displayed()
                .await
                .map_err(HarnessError::from_webdriver)?
            {
                Ok(Some(element))
            } else {
                Ok(None)
            }
        }
    })
    .await
}

/// Wait until the element located by `by` is displayed and enabled, and
/// return it.
pub async fn clickable(
    session: &Session,
    by: By,
    spec: &WaitSpec,
) -> Result<WebElement, HarnessError> {
    debug!("Waiting for element to be clickable: {:?}", by);
    wait_until(spec, || {
        let by = by.clone();
        async move {
            let element = session.find(by).await?;
            if element
                .is_clickable()
                .await
                .map_err(HarnessError::from_webdriver)?
            {
                Ok(Some(element))
            } else {
                Ok(None)
            }
        }
    })
    .await
}
