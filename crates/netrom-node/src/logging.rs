//! Tracing subscriber setup for Net/ROM nodes.
//!
//! Level conventions:
//! - ERROR: fatal startup failures
//! - WARN: recoverable failures (storage, a connector going down)
//! - INFO: circuit and session lifecycle
//! - DEBUG: per-frame decisions, dropped broadcasts
//! - TRACE: wire-level frames

use tracing_subscriber::EnvFilter;

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Human-readable output. `RUST_LOG` overrides `default_level`.
pub fn init(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .init();
}

/// JSON lines, selected with `RUST_LOG_FORMAT=json`.
pub fn init_json(default_level: &str) {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter(default_level))
        .init();
}

/// Test-friendly output. Safe to call from every test.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("debug"))
        .with_test_writer()
        .try_init();
}
