//! webharness
//!
//! Session lifecycle and resilient interaction engine for browser-driven
//! end-to-end UI tests: one exclusively-owned WebDriver session per
//! concurrent worker across local, grid and cloud backends, plus the
//! wait/retry machinery that makes interactions tolerant of transient
//! browser-state errors.

pub mod config;
pub mod errors;
pub mod notify;
pub mod page;
pub mod retry;
pub mod session;
pub mod suite;
pub mod wait;

use std::path::PathBuf;

use tracing::info;

pub use config::{BackendKind, BrowserKind, CloudCredentials, ExecutionConfig};
pub use errors::{HarnessError, TransientKind};
pub use notify::{LifecycleNotifier, NoopNotifier};
pub use page::Page;
pub use retry::{InteractionProxy, RetryPolicy};
pub use session::{
    Session, SessionFactory, SessionInfo, SessionRegistry, SessionSnapshot, WebDriverBackend,
    WorkerId,
};
pub use suite::Suite;
pub use wait::WaitSpec;

/// Get log directory path (shared across modules)
pub fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("webharness").join("logs"))
}

/// Initialize logging with a console layer and, when a log directory is
/// available, a daily rolling file layer. Returns the appender guard; keep
/// it alive for the duration of the run.
pub fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    if let Some(log_dir) = log_dir() {
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "webharness.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Log files saved to: {}", log_dir.display());
        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();

        None
    }
}
