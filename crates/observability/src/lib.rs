//! Shared tracing/logging setup for binaries and tests.

/// Initialize process-wide tracing.
///
/// Idempotent; calling it again after a subscriber is installed is a no-op.
pub fn init() {
    tracing::init();
}

/// Tracing subscriber configuration.
pub mod tracing;
