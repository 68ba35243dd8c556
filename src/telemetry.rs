//! Tracing Setup
//!
//! Initializes tracing-subscriber with environment-based filtering.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize structured logging.
///
/// Sets up tracing-subscriber with an `RUST_LOG`-driven filter (defaulting
/// to `info`) and a fmt layer. Returns an error if a global subscriber is
/// already installed.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    tracing::info!("telemetry initialized");
    Ok(())
}
