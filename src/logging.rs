// src/logging.rs
// =============================================================================
// Sets up structured logging with `tracing`.
//
// Log lines go to stderr so `--json` event output on stdout can be piped
// straight into another tool. RUST_LOG controls the level (default: info).
// =============================================================================

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize human-readable logging.
pub fn init() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter())
        .init();
}

/// Initialize JSON logging (one object per line).
pub fn init_json() {
    tracing_subscriber::registry()
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .with(env_filter())
        .init();
}
