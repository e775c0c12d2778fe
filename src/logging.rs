use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{config::LoggingConfig, errors::MovieKgError};

/// Installs the global subscriber, writing to stderr. `RUST_LOG` overrides the
/// configured level; `verbosity` (from `-v` flags) raises it.
pub fn init(config: &LoggingConfig, verbosity: u8) -> Result<(), MovieKgError> {
    let level = match verbosity {
        0 => config.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| MovieKgError::invalid_input(format!("invalid log level {level:?}: {e}")))?;

    if config.json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .try_init()
            .map_err(init_error)
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .with(filter)
            .try_init()
            .map_err(init_error)
    }
}

fn init_error(err: tracing_subscriber::util::TryInitError) -> MovieKgError {
    MovieKgError::invalid_input(format!("cannot install log subscriber: {err}"))
}
