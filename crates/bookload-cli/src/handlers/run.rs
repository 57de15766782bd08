//! `bookload run`

use crate::commands::RunArgs;
use crate::error::{CliError, CliResult};
use bookload::{render_text, ReqwestClient, RunReport, SimulationKind};
use tracing::info;

/// Build the simulation, run it on a fresh runtime and return the report
pub fn execute(args: &RunArgs) -> CliResult<RunReport> {
    let config = args.settings.resolve()?;
    let kind = SimulationKind::from(args.simulation);
    let simulation = kind.build(&config)?;
    let client = ReqwestClient::new(config.request_timeout())?;
    info!(simulation = %kind, base_url = %config.base_url, "starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    Ok(runtime.block_on(simulation.run(client))?)
}

/// Run, print the report and turn a failed verdict into an error
pub fn run(args: &RunArgs, quiet: bool) -> CliResult<()> {
    let report = execute(args)?;
    if !quiet {
        print!("{}", render_text(&report));
    }
    if let Some(path) = &args.json {
        report.write_json(path)?;
        info!(path = %path.display(), "JSON report written");
    }
    verdict(&report)
}

/// `Ok` iff every assertion held
pub fn verdict(report: &RunReport) -> CliResult<()> {
    if report.passed {
        Ok(())
    } else {
        Err(CliError::AssertionsFailed {
            failed: report.assertions.iter().filter(|a| !a.passed).count(),
            total: report.assertions.len(),
        })
    }
}
