//! Bookload CLI: CRUD load testing for booking APIs
//!
//! ## Usage
//!
//! ```bash
//! bookload run                                   # CRUD simulation, defaults
//! bookload run -s smoke --base-url http://localhost:3001
//! bookload run --ramp-users 20 --target-rps 50 --json report.json
//! bookload config --config run.yaml              # Show effective settings
//! bookload list                                  # Show built-in simulations
//! ```
//!
//! Exits 0 only when every assertion of the run held.

use bookload_cli::{handlers, logging, Cli, CliResult, Commands};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet, cli.log_json)?;

    match cli.command {
        Commands::Run(args) => handlers::run::run(&args, cli.quiet),
        Commands::Config(args) => {
            print!("{}", handlers::inspect::config(&args)?);
            Ok(())
        }
        Commands::List => {
            print!("{}", handlers::inspect::list()?);
            Ok(())
        }
    }
}
