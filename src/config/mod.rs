//! Execution configuration module
//!
//! Resolves the immutable `ExecutionConfig` from an abstract key-value
//! source. File parsing and overlay loading belong to external
//! collaborators; they feed a `MapSource` (or any other `ConfigSource`).

mod execution;
mod source;

pub use execution::{BackendKind, BrowserKind, CloudCredentials, ExecutionConfig};
pub(crate) use execution::validate_hub_url;
pub use source::{ConfigSource, EnvSource, LayeredSource, MapSource};
