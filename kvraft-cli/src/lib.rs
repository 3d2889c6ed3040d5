//! Shared plumbing for the `kv-server` and `kv-client` binaries.

pub mod logging;

pub use logging::{init_tracing, LogFormat, LOG_LEVELS};
