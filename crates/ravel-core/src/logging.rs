//! Tracing initialization for ravel services.
//!
//! Call one of these once at startup, before building the [`Application`].
//! The log level is controlled by `RUST_LOG` (`info` when unset):
//!
//! ```bash
//! RUST_LOG=debug cargo run --example http_hello
//! RUST_LOG=ravel_core=debug cargo run
//! ```
//!
//! [`Application`]: crate::app::Application

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging with sensible defaults.
///
/// # Panics
///
/// Panics if a global subscriber is already installed. Only call it once.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize logging at a specific level, ignoring `RUST_LOG`-less defaults.
///
/// # Panics
///
/// Panics if a global subscriber is already installed. Only call it once.
pub fn init_logging_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
