//! Logging configuration

use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing_subscriber::{fmt, fmt::MakeWriter, prelude::*, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, text)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Read `ESCROW_LOG_LEVEL` and `ESCROW_LOG_FORMAT`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            level: lookup("ESCROW_LOG_LEVEL")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.level),
            format: lookup("ESCROW_LOG_FORMAT")
                .map(|s| s.to_lowercase())
                .filter(|s| s == "json" || s == "text")
                .unwrap_or(defaults.format),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Initialize tracing; `RUST_LOG` overrides the configured level
///
/// Logs always go to stderr so command output on stdout stays parseable.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    tracing::subscriber::set_global_default(subscriber(config, std::io::stderr)?)?;
    Ok(())
}

/// Build the subscriber for `config`, writing through `make_writer`
pub fn subscriber<W>(
    config: &LoggingConfig,
    make_writer: W,
) -> anyhow::Result<Box<dyn Subscriber + Send + Sync>>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    Ok(match config.format.as_str() {
        "json" => Box::new(
            registry.with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(make_writer),
            ),
        ),
        _ => Box::new(registry.with(fmt::layer().with_target(true).with_writer(make_writer))),
    })
}
