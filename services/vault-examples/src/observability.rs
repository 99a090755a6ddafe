//! Tracing subscriber setup for the sample binary.
//!
//! Logs go to stderr so stdout carries only the retrieved value.

use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output settings.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Filter used when `RUST_LOG` is unset
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            json: false,
            default_level: "info".to_string(),
        }
    }
}

/// Build the filter: `RUST_LOG` wins over the configured default.
///
/// # Errors
///
/// Returns an error if the default level is not a valid filter directive.
pub fn env_filter(config: &LogConfig) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_level))
        .with_context(|| format!("invalid log level {:?}", config.default_level))
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a subscriber is already set.
pub fn init_tracing(config: &LogConfig) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config)?);

    if config.json {
        let layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_writer(std::io::stderr);
        registry.with(layer).try_init()?;
    } else {
        let layer = fmt::layer().with_target(true).with_writer(std::io::stderr);
        registry.with(layer).try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_default_level_rejected() {
        let config = LogConfig {
            json: false,
            default_level: "vault_client=verbose".to_string(),
        };
        // RUST_LOG may be set in CI; only assert when it is not
        if std::env::var("RUST_LOG").is_err() {
            assert!(env_filter(&config).is_err());
        }
    }

    #[test]
    fn test_default_level_accepted() {
        assert!(env_filter(&LogConfig::default()).is_ok());
    }
}
