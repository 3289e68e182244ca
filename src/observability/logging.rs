//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Pick the filter: `RUST_LOG` when set, the configured directive otherwise
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Installing twice is an error, not a silent no-op

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::error::Error;

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), Error> {
    let filter = build_filter(config)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| Error::illegal_configuration(format!("failed to install logger: {e}")))
}

fn build_filter(config: &ObservabilityConfig) -> Result<EnvFilter, Error> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.log_filter).map_err(|e| {
            Error::illegal_configuration(format!("invalid log filter '{}': {e}", config.log_filter))
        }),
    }
}
