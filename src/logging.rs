use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::AstroError;

/// Install a formatted `tracing` subscriber.
///
/// `RUST_LOG` wins when it parses; otherwise the configured level is used.
/// Fails if a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), AstroError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| AstroError::Config(format!("Failed to initialize logging: {}", e)))
}
