//! Backend-agnostic capability resolution

use serde_json::Value;
use thirtyfour::error::WebDriverError;
use thirtyfour::prelude::*;
use thirtyfour::{Capabilities, DesiredCapabilities};
use tracing::debug;

use crate::config::{BackendKind, BrowserKind, ExecutionConfig};
use crate::errors::HarnessError;

fn arg_err(e: WebDriverError) -> HarnessError {
    HarnessError::Configuration(format!("failed to add browser argument: {e}"))
}

/// Build the capability set for a configuration.
///
/// Pure with respect to the outside world: no network, no driver. Merge
/// order is browser options, then cloud credentials (cloud backend only),
/// then `cap.*` overrides last — an override always wins over a
/// generically-derived capability with the same key.
pub fn build_capabilities(config: &ExecutionConfig) -> Result<Capabilities, HarnessError> {
    let mut caps: Capabilities = match config.browser() {
        BrowserKind::Chrome => {
            let mut opts = DesiredCapabilities::chrome();
            if config.headless() {
                opts.add_arg("--headless=new").map_err(arg_err)?;
            }
            for arg in [
                "--disable-gpu",
                "--window-size=1920,1080",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--disable-infobars",
                "--remote-allow-origins=*",
            ] {
                opts.add_arg(arg).map_err(arg_err)?;
            }
            opts.into()
        }
        BrowserKind::Firefox => {
            let mut opts = DesiredCapabilities::firefox();
            if config.headless() {
                opts.add_arg("-headless").map_err(arg_err)?;
            }
            opts.into()
        }
        BrowserKind::Edge => {
            let mut opts = DesiredCapabilities::edge();
            if config.headless() {
                opts.add_arg("--headless=new").map_err(arg_err)?;
            }
            opts.add_arg("--window-size=1920,1080").map_err(arg_err)?;
            opts.into()
        }
        // Safari has no headless mode. Keep defaults.
        BrowserKind::Safari => DesiredCapabilities::safari().into(),
    };

    if config.backend() == BackendKind::Cloud {
        if let Some(creds) = config.credentials() {
            if !creds.user.is_empty() {
                caps.insert("username".to_string(), Value::String(creds.user.clone()));
            }
            if !creds.key.is_empty() {
                caps.insert("accessKey".to_string(), Value::String(creds.key.clone()));
            }
        }
    }

    for (key, value) in config.capability_overrides() {
        debug!("Applying capability override {}={}", key, value);
        caps.insert(key.clone(), Value::String(value.clone()));
    }

    Ok(caps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExecutionConfig, MapSource};

    fn resolve(pairs: &[(&str, &str)]) -> ExecutionConfig {
        let source = MapSource::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        ExecutionConfig::resolve(&source).unwrap()
    }

    fn chrome_args(caps: &Capabilities) -> Vec<String> {
        caps.get("goog:chromeOptions")
            .and_then(|o| o.get("args"))
            .and_then(|a| a.as_array())
            .map(|args| {
                args.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn firefox_args(caps: &Capabilities) -> Vec<String> {
        caps.get("moz:firefoxOptions")
            .and_then(|o| o.get("args"))
            .and_then(|a| a.as_array())
            .map(|args| {
                args.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_headless_chrome_carries_headless_flag() {
        let config = resolve(&[("browser", "chrome"), ("headless", "true")]);
        let caps = build_capabilities(&config).unwrap();
        let args = chrome_args(&caps);
        assert!(args.iter().any(|a| a == "--headless=new"), "{args:?}");
    }

    #[test]
    fn test_headful_chrome_has_no_headless_flag() {
        let config = resolve(&[("browser", "chrome")]);
        let caps = build_capabilities(&config).unwrap();
        let args = chrome_args(&caps);
        assert!(!args.iter().any(|a| a.starts_with("--headless")), "{args:?}");
        assert!(args.iter().any(|a| a == "--no-sandbox"));
    }

    #[test]
    fn test_firefox_headless_is_gated_on_flag() {
        let config = resolve(&[("browser", "firefox"), ("headless", "true")]);
        let caps = build_capabilities(&config).unwrap();
        assert!(firefox_args(&caps).iter().any(|a| a == "-headless"));

        let config = resolve(&[("browser", "firefox")]);
        let caps = build_capabilities(&config).unwrap();
        assert!(!firefox_args(&caps).iter().any(|a| a == "-headless"));
    }

    #[test]
    fn test_cloud_credentials_merged_under_conventional_keys() {
        let config = resolve(&[
            ("execution.type", "cloud"),
            ("cloud.url", "https://hub.provider.example/wd/hub"),
            ("cloud.user", "alice"),
            ("cloud.key", "s3cret"),
        ]);
        let caps = build_capabilities(&config).unwrap();
        assert_eq!(caps.get("username").and_then(|v| v.as_str()), Some("alice"));
        assert_eq!(caps.get("accessKey").and_then(|v| v.as_str()), Some("s3cret"));
    }

    #[test]
    fn test_empty_cloud_credentials_are_not_merged() {
        let config = resolve(&[
            ("execution.type", "cloud"),
            ("cloud.url", "https://hub.provider.example/wd/hub"),
        ]);
        let caps = build_capabilities(&config).unwrap();
        assert!(caps.get("username").is_none());
        assert!(caps.get("accessKey").is_none());
    }

    #[test]
    fn test_capability_override_beats_derived_value() {
        let config = resolve(&[
            ("execution.type", "cloud"),
            ("cloud.url", "https://hub.provider.example/wd/hub"),
            ("cloud.user", "alice"),
            ("cap.username", "bob"),
        ]);
        let caps = build_capabilities(&config).unwrap();
        assert_eq!(caps.get("username").and_then(|v| v.as_str()), Some("bob"));
    }

    #[test]
    fn test_overrides_apply_on_all_backends() {
        let config = resolve(&[("cap.platformName", "Windows 11")]);
        let caps = build_capabilities(&config).unwrap();
        assert_eq!(
            caps.get("platformName").and_then(|v| v.as_str()),
            Some("Windows 11")
        );
    }

    #[test]
    fn test_safari_keeps_default_capabilities() {
        let config = resolve(&[("browser", "safari")]);
        let caps = build_capabilities(&config).unwrap();
        assert_eq!(caps.get("browserName").and_then(|v| v.as_str()), Some("safari"));
    }
}
