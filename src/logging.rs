//! Tracing subscriber setup

use std::io;

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Build the filter: `RUST_LOG` wins over the configured level, HTTP internals stay quiet
fn env_filter(level: &str) -> EnvFilter {
    std::env::var("RUST_LOG")
        .map_or_else(|_| EnvFilter::new(level), EnvFilter::new)
        .add_directive(
            "hyper=warn"
                .parse()
                .unwrap_or_else(|_| tracing::Level::WARN.into()),
        )
        .add_directive(
            "reqwest=warn"
                .parse()
                .unwrap_or_else(|_| tracing::Level::WARN.into()),
        )
}

/// Install the global subscriber. Logs go to stderr so command output stays parseable.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(&config.level));

    let installed = match config.format.as_str() {
        "json" => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_writer(io::stderr)
                    .json(),
            )
            .try_init(),
        _ => registry
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .try_init(),
    };

    installed.map_err(|e| anyhow!("Failed to initialize logging: {e}"))
}
