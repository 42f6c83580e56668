//! Tracing subscriber setup.
//!
//! JSON-formatted structured logs, filtered via `RUST_LOG` with an `info`
//! default.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// Idempotent: if a subscriber is already set, the error from `try_init`
/// is dropped.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
