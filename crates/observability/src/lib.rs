//! Tracing and logging setup shared by binaries and integration tests.

/// Initialize process-wide tracing from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with(&tracing::ObservabilityConfig::from_env());
}

/// Subscriber configuration (format, filters).
pub mod tracing;

pub use tracing::{init_with, LogFormat, ObservabilityConfig, ParseLogFormatError};
