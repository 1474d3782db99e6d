// Logging module for structured logging using the tracing crate

use std::error::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Initialize the tracing subscriber for structured logging.
///
/// Log level defaults to `info` and can be overridden with `RUST_LOG`
/// (e.g. `RUST_LOG=zimgx=debug`). Output goes to stdout with compact
/// single-line formatting suitable for container deployments.
pub fn init_subscriber() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer().compact().with_target(true);

    let subscriber = Registry::default().with(filter).with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Box::new(e) as Box<dyn Error>)?;

    Ok(())
}
