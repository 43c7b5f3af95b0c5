//! Resolved execution configuration

use std::collections::BTreeMap;

use tracing::{info, warn};
use url::Url;

use super::ConfigSource;
use crate::errors::HarnessError;

/// Default remote hub for grid execution.
const DEFAULT_GRID_URL: &str = "http://localhost:4444/wd/hub";
/// Default base URL opened by the page layer.
const DEFAULT_BASE_URL: &str = "https://the-internet.herokuapp.com/";
/// Page loads never time out faster than this, regardless of explicit.wait.
const PAGE_LOAD_FLOOR_SECS: u64 = 30;

/// Browser to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chrome,
    Firefox,
    Edge,
    Safari,
}

impl BrowserKind {
    fn parse(value: &str) -> Result<Self, HarnessError> {
        match value.to_lowercase().as_str() {
            "chrome" => Ok(BrowserKind::Chrome),
            "firefox" => Ok(BrowserKind::Firefox),
            "edge" => Ok(BrowserKind::Edge),
            "safari" => Ok(BrowserKind::Safari),
            other => Err(HarnessError::UnsupportedBrowser(other.to_string())),
        }
    }

    /// Conventional localhost endpoint of the matching driver server.
    /// Locating and launching the driver binary is the provisioning
    /// collaborator's job.
    pub fn default_local_url(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "http://localhost:9515",
            BrowserKind::Firefox => "http://localhost:4444",
            BrowserKind::Edge => "http://localhost:9515",
            BrowserKind::Safari => "http://localhost:4445",
        }
    }
}

impl std::fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Edge => "edge",
            BrowserKind::Safari => "safari",
        };
        f.write_str(s)
    }
}

/// Execution target for sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Grid,
    Cloud,
}

impl BackendKind {
    fn parse(value: &str) -> Result<Self, HarnessError> {
        match value.to_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "grid" => Ok(BackendKind::Grid),
            "cloud" => Ok(BackendKind::Cloud),
            other => Err(HarnessError::Configuration(format!(
                "unknown execution.type: {other}"
            ))),
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, BackendKind::Local)
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BackendKind::Local => "local",
            BackendKind::Grid => "grid",
            BackendKind::Cloud => "cloud",
        };
        f.write_str(s)
    }
}

/// Cloud provider credentials, merged into capabilities under the
/// conventional `username` / `accessKey` keys.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CloudCredentials {
    pub user: String,
    pub key: String,
}

/// Immutable, resolved execution configuration.
///
/// Built once from a [`ConfigSource`] via [`ExecutionConfig::resolve`]; all
/// fields except the opaque capability overrides are validated there.
/// Sessions copy their effective timeouts at creation time, so mutating a
/// later config never affects an open session.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub(crate) browser: BrowserKind,
    pub(crate) headless: bool,
    pub(crate) backend: BackendKind,
    /// Remote hub URL; empty for local execution.
    pub(crate) hub_url: String,
    /// Local driver-server endpoint override.
    pub(crate) local_url: Option<String>,
    pub(crate) credentials: Option<CloudCredentials>,
    pub(crate) base_url: String,
    pub(crate) implicit_wait_secs: u64,
    pub(crate) explicit_wait_secs: u64,
    pub(crate) page_load_timeout_secs: u64,
    pub(crate) retry_enabled: bool,
    pub(crate) retry_count: u32,
    /// Opaque passthrough capabilities from `cap.*` keys. Values always win
    /// over generically-derived capabilities with the same key.
    pub(crate) capability_overrides: BTreeMap<String, String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            browser: BrowserKind::Chrome,
            headless: false,
            backend: BackendKind::Local,
            hub_url: String::new(),
            local_url: None,
            credentials: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            implicit_wait_secs: 0,
            explicit_wait_secs: 20,
            page_load_timeout_secs: PAGE_LOAD_FLOOR_SECS,
            retry_enabled: false,
            retry_count: 0,
            capability_overrides: BTreeMap::new(),
        }
    }
}

impl ExecutionConfig {
    /// Resolve and validate a configuration from a key-value source.
    ///
    /// Recognized keys: `browser`, `headless`, `execution.type`, `grid.url`,
    /// `cloud.url`, `cloud.user`, `cloud.key`, `local.url`, `base.url`,
    /// `implicit.wait`, `explicit.wait`, `retry.enabled`, `retry.count`,
    /// and `cap.*` passthrough overrides.
    pub fn resolve(source: &dyn ConfigSource) -> Result<Self, HarnessError> {
        let browser = BrowserKind::parse(&get_or(source, "browser", "chrome"))?;
        let headless = parse_bool(&get_or(source, "headless", "false"));
        let backend = BackendKind::parse(&get_or(source, "execution.type", "local"))?;

        let hub_url = match backend {
            BackendKind::Local => String::new(),
            BackendKind::Grid => get_or(source, "grid.url", DEFAULT_GRID_URL),
            BackendKind::Cloud => get_or(source, "cloud.url", ""),
        };
        if backend.is_remote() {
            validate_hub_url(&hub_url)?;
        }

        let credentials = match backend {
            BackendKind::Cloud => Some(CloudCredentials {
                user: get_or(source, "cloud.user", ""),
                key: get_or(source, "cloud.key", ""),
            }),
            _ => None,
        };

        let implicit_wait_secs = parse_u64(source, "implicit.wait", 0);
        let explicit_wait_secs = parse_u64(source, "explicit.wait", 20);
        let page_load_timeout_secs = PAGE_LOAD_FLOOR_SECS.max(explicit_wait_secs);

        let retry_enabled = parse_bool(&get_or(source, "retry.enabled", "false"));
        let retry_count = parse_u64(source, "retry.count", 0) as u32;

        let capability_overrides: BTreeMap<String, String> = source
            .keys()
            .into_iter()
            .filter_map(|key| {
                let suffix = key.strip_prefix("cap.")?;
                let value = source.get(&key)?;
                Some((suffix.to_string(), value))
            })
            .collect();

        let config = Self {
            browser,
            headless,
            backend,
            hub_url,
            local_url: source.get("local.url").filter(|u| !u.is_empty()),
            credentials,
            base_url: get_or(source, "base.url", DEFAULT_BASE_URL),
            implicit_wait_secs,
            explicit_wait_secs,
            page_load_timeout_secs,
            retry_enabled,
            retry_count,
            capability_overrides,
        };

        info!(
            "Resolved execution config: browser={}, headless={}, backend={}, overrides={}",
            config.browser,
            config.headless,
            config.backend,
            config.capability_overrides.len()
        );

        Ok(config)
    }

    pub fn browser(&self) -> BrowserKind {
        self.browser
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }

    /// Endpoint of the local driver server for this browser.
    pub fn local_url(&self) -> &str {
        self.local_url
            .as_deref()
            .unwrap_or_else(|| self.browser.default_local_url())
    }

    pub fn credentials(&self) -> Option<&CloudCredentials> {
        self.credentials.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn implicit_wait_secs(&self) -> u64 {
        self.implicit_wait_secs
    }

    pub fn explicit_wait_secs(&self) -> u64 {
        self.explicit_wait_secs
    }

    pub fn page_load_timeout_secs(&self) -> u64 {
        self.page_load_timeout_secs
    }

    pub fn retry_enabled(&self) -> bool {
        self.retry_enabled
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn capability_overrides(&self) -> &BTreeMap<String, String> {
        &self.capability_overrides
    }
}

/// Validate that a remote hub URL is present and well-formed. Also invoked
/// by the backend resolver before any network attempt.
pub(crate) fn validate_hub_url(hub_url: &str) -> Result<(), HarnessError> {
    if hub_url.is_empty() {
        return Err(HarnessError::Configuration(
            "remote hub URL is not configured".to_string(),
        ));
    }
    Url::parse(hub_url)
        .map_err(|e| HarnessError::Configuration(format!("invalid remote hub URL '{hub_url}': {e}")))?;
    Ok(())
}

fn get_or(source: &dyn ConfigSource, key: &str, default: &str) -> String {
    source.get(key).unwrap_or_else(|| default.to_string())
}

/// Lenient boolean parsing: "true", "1" and "yes" are true, anything else
/// is false.
fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_u64(source: &dyn ConfigSource, key: &str, default: u64) -> u64 {
    let Some(raw) = source.get(key) else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(v) => v,
        Err(_) => {
            warn!("Invalid integer for key='{}' value='{}', using default={}", key, raw, default);
            default
        }
    }
}
