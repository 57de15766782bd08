//! CLI command definitions using clap

use bookload::{BookloadResult, RunConfig, SimulationKind};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Bookload: CRUD load testing for booking APIs
#[derive(Parser, Debug)]
#[command(name = "bookload")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a simulation and exit non-zero if any assertion fails
    Run(RunArgs),

    /// Print the effective configuration as YAML
    Config(ConfigArgs),

    /// List the built-in simulations and their scenarios
    List,
}

/// Built-in simulation selector
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationArg {
    /// Token, create, read, update, delete plus a bad-token flow
    Crud,
    /// One user pings and lists booking ids
    Smoke,
}

impl From<SimulationArg> for SimulationKind {
    fn from(arg: SimulationArg) -> Self {
        match arg {
            SimulationArg::Crud => Self::Crud,
            SimulationArg::Smoke => Self::Smoke,
        }
    }
}

/// Settings shared by `run` and `config`; flags override the YAML file
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// YAML file with base settings
    #[arg(short, long, env = "BOOKLOAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Target service root
    #[arg(long, env = "BOOKLOAD_BASE_URL")]
    pub base_url: Option<String>,

    /// Total run duration in seconds
    #[arg(long, env = "BOOKLOAD_DURATION_SEC")]
    pub duration_sec: Option<u64>,

    /// Sessions ramped over the run duration
    #[arg(long, env = "BOOKLOAD_RAMP_USERS")]
    pub ramp_users: Option<u32>,

    /// Throttle steady-state requests per second
    #[arg(long, env = "BOOKLOAD_TARGET_RPS")]
    pub target_rps: Option<f64>,

    /// Seconds sessions may drain after the duration before cancellation
    #[arg(long, env = "BOOKLOAD_GRACE_SEC")]
    pub grace_sec: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, env = "BOOKLOAD_TIMEOUT_SEC")]
    pub timeout_sec: Option<u64>,

    /// Seed for generated booking data
    #[arg(long, env = "BOOKLOAD_SEED")]
    pub seed: Option<u64>,
}

impl ConfigArgs {
    /// Load the base file (or defaults) and apply flag overrides
    pub fn resolve(&self) -> BookloadResult<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        if let Some(secs) = self.duration_sec {
            config = config.with_duration_secs(secs);
        }
        if let Some(users) = self.ramp_users {
            config = config.with_ramp_users(users);
        }
        if let Some(rps) = self.target_rps {
            config = config.with_target_rps(rps);
        }
        if let Some(secs) = self.grace_sec {
            config = config.with_grace_secs(secs);
        }
        if let Some(secs) = self.timeout_sec {
            config = config.with_request_timeout_secs(secs);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Simulation to run
    #[arg(
        short,
        long,
        value_enum,
        default_value = "crud",
        env = "BOOKLOAD_SIMULATION"
    )]
    pub simulation: SimulationArg,

    /// Run settings
    #[command(flatten)]
    pub settings: ConfigArgs,

    /// Also write the report as JSON to this path
    #[arg(long)]
    pub json: Option<PathBuf>,
}
