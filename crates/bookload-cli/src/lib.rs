//! Bookload CLI library
//!
//! Argument parsing, logging setup and command handlers for the `bookload`
//! binary. Kept as a library so the handlers can be tested without a
//! process boundary.

#![warn(missing_docs)]

mod commands;
mod error;
pub mod handlers;
pub mod logging;

pub use commands::{Cli, Commands, ConfigArgs, RunArgs, SimulationArg};
pub use error::{CliError, CliResult};
