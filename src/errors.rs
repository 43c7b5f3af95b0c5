//! Harness error types

use std::collections::HashSet;

use thirtyfour::error::WebDriverError;
use thiserror::Error;

/// Classified transient interaction failures. These are the errors a retry
/// or a wait is allowed to absorb; everything else is terminal at the call
/// site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransientKind {
    /// Element not located yet ("no such element").
    ElementNotFound,
    /// Element reference went stale between lookup and use.
    StaleReference,
    /// Another element swallowed the click.
    ClickIntercepted,
}

impl TransientKind {
    /// The full transient set, used as the default for both retry policies
    /// and wait specs.
    pub fn all() -> HashSet<TransientKind> {
        [
            TransientKind::ElementNotFound,
            TransientKind::StaleReference,
            TransientKind::ClickIntercepted,
        ]
        .into_iter()
        .collect()
    }
}

impl std::fmt::Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransientKind::ElementNotFound => "element-not-found",
            TransientKind::StaleReference => "stale-reference",
            TransientKind::ClickIntercepted => "click-intercepted",
        };
        f.write_str(s)
    }
}

/// Harness-wide errors
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported browser: {0}")]
    UnsupportedBrowser(String),

    #[error("Failed to create session: {0}")]
    SessionCreation(String),

    #[error("Transient interaction error ({kind}): {message}")]
    Transient { kind: TransientKind, message: String },

    #[error("Wait timed out after {}ms{}", .waited_ms, .last_error.as_deref().map(|e| format!(" (last error: {e})")).unwrap_or_default())]
    Timeout {
        waited_ms: u64,
        last_error: Option<String>,
    },

    #[error("Session already closed: {0}")]
    SessionClosed(String),

    #[error("WebDriver error: {0}")]
    Driver(String),
}

impl HarnessError {
    /// Classify a thirtyfour error into the harness taxonomy. Matching is
    /// done on the W3C error-code phrase carried in the message, which is
    /// stable across driver implementations.
    pub fn from_webdriver(err: WebDriverError) -> Self {
        let message = err.to_string();
        let lower = message.to_lowercase();

        if lower.contains("no such element") {
            HarnessError::Transient {
                kind: TransientKind::ElementNotFound,
                message,
            }
        } else if lower.contains("stale element") {
            HarnessError::Transient {
                kind: TransientKind::StaleReference,
                message,
            }
        } else if lower.contains("click intercepted") {
            HarnessError::Transient {
                kind: TransientKind::ClickIntercepted,
                message,
            }
        } else if lower.contains("invalid session id") {
            HarnessError::SessionClosed(message)
        } else if lower.contains("session not created") {
            HarnessError::SessionCreation(message)
        } else {
            HarnessError::Driver(message)
        }
    }

    /// The transient class of this error, if it has one.
    pub fn transient_kind(&self) -> Option<TransientKind> {
        match self {
            HarnessError::Transient { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(msg: &str) -> HarnessError {
        HarnessError::from_webdriver(WebDriverError::RequestFailed(msg.to_string()))
    }

    #[test]
    fn test_classifies_no_such_element_as_transient() {
        let err = classify("no such element: Unable to locate element: #login");
        assert_eq!(err.transient_kind(), Some(TransientKind::ElementNotFound));
    }

    #[test]
    fn test_classifies_stale_reference_as_transient() {
        let err = classify("stale element reference: element is not attached");
        assert_eq!(err.transient_kind(), Some(TransientKind::StaleReference));
    }

    #[test]
    fn test_classifies_click_intercepted_as_transient() {
        let err = classify("element click intercepted: other element would receive the click");
        assert_eq!(err.transient_kind(), Some(TransientKind::ClickIntercepted));
    }

    #[test]
    fn test_invalid_session_maps_to_session_closed() {
        let err = classify("invalid session id");
        assert!(matches!(err, HarnessError::SessionClosed(_)));
    }

    #[test]
    fn test_unclassified_errors_are_not_transient() {
        let err = classify("unknown command: unrecognized endpoint");
        assert!(matches!(err, HarnessError::Driver(_)));
        assert_eq!(err.transient_kind(), None);
    }

    #[test]
    fn test_timeout_display_carries_last_error() {
        let err = HarnessError::Timeout {
            waited_ms: 1500,
            last_error: Some("no such element: #x".to_string()),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("1500ms"));
        assert!(rendered.contains("no such element"));
    }
}
