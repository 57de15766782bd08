//! Tracing subscriber setup

use crate::error::{CliError, CliResult};
use tracing_subscriber::EnvFilter;

/// Default filter for a verbosity level; `RUST_LOG` takes precedence
#[must_use]
pub fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn,bookload=info",
        1 => "info,bookload=debug",
        _ => "debug,bookload=trace",
    }
}

/// Install the global subscriber, writing to stderr
pub fn init(verbose: u8, quiet: bool, json: bool) -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| CliError::logging(e.to_string()))
}
