//! `bookload config` and `bookload list`

use crate::commands::ConfigArgs;
use crate::error::CliResult;
use bookload::{RunConfig, SimulationKind};
use std::fmt::Write as _;

/// Effective configuration as YAML
pub fn config(args: &ConfigArgs) -> CliResult<String> {
    Ok(args.resolve()?.to_yaml()?)
}

/// Built-in simulations with their scenarios, steps and assertions
pub fn list() -> CliResult<String> {
    let config = RunConfig::default();
    let mut out = String::new();
    for kind in SimulationKind::ALL {
        let simulation = kind.build(&config)?;
        let _ = writeln!(out, "{kind} ({})", simulation.name());
        for population in simulation.populations() {
            let _ = writeln!(
                out,
                "  {} [{} sessions]",
                population.scenario.name(),
                population.profile.session_count()
            );
            for step in population.scenario.steps() {
                let _ = writeln!(
                    out,
                    "    {} {}  {}",
                    step.method(),
                    step.path(),
                    step.name()
                );
            }
        }
        for assertion in simulation.assertions() {
            let _ = writeln!(out, "  assert {}", assertion.description());
        }
    }
    Ok(out)
}
