//! Process-wide `tracing` subscriber setup

use tracing_subscriber::{fmt, EnvFilter};
use treesync_config::LoggingConfig;
use treesync_types::{Error, Result};

/// Install a `tracing` subscriber configured from `config`
///
/// `RUST_LOG` takes precedence over the configured level. Installing twice
/// fails because the global subscriber can only be set once.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::config(format!("invalid log level '{}': {}", config.level, e)))?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(config.colored_output);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| Error::config(format!("cannot install tracing subscriber: {}", e)))
}
