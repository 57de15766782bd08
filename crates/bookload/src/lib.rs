//! Bookload: scenario-driven HTTP load testing.
//!
//! Virtual-user sessions run named scenarios of chained requests against a
//! booking API. Values extracted from one response (auth tokens, created
//! ids) flow into later requests through session variables. A global
//! throttle caps the aggregate request rate, and end-of-run assertions over
//! the collected results decide whether the run passed.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   arrivals   ┌──────────────┐  slot   ┌──────────────┐
//! │  Injection   │─────────────►│   Executor   │◄───────►│   Throttle   │
//! │  profiles    │              │  (sessions)  │         └──────────────┘
//! └──────────────┘              └──────┬───────┘
//!        ▲                   feed │    │ send
//!        │                ┌───────▼┐  ┌▼───────────┐
//!  ┌─────┴──────┐         │ Feeder │  │ HttpClient │
//!  │ Simulation │         └────────┘  └────────────┘
//!  └─────┬──────┘                     RunResult │
//!        │                          ┌───────────▼─┐
//!        └─────── assertions ──────►│ Aggregator  │──► RunReport
//!                                   └─────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use bookload::{smoke_simulation, ReqwestClient, RunConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunConfig::default().with_base_url("http://localhost:3001");
//! let client = ReqwestClient::new(config.request_timeout())?;
//! let report = smoke_simulation(&config)?.run(client).await?;
//! println!("{}", bookload::render_text(&report));
//! assert!(report.passed);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod assertion;
pub mod check;
pub mod config;
pub mod error;
pub mod executor;
pub mod feeder;
pub mod http;
pub mod injection;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod simulations;
pub mod template;
pub mod throttle;

pub use assertion::{evaluate_all, Assertion, AssertionOutcome, Bound, Scope, Verdict};
pub use check::{Check, CheckResult, FieldPath, ParsedResponse};
pub use config::{RunConfig, DEFAULT_BASE_URL, MAX_SECS};
pub use error::{BookloadError, BookloadResult, FeederExhausted, InterpolationError, TransportError};
pub use executor::{Executor, SessionOutcome, SessionSummary};
pub use feeder::{BookingFeeder, FeederRecord};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use injection::{merge_timelines, Arrival, InjectionProfile};
pub use metrics::{Aggregator, FailureKind, Metrics, RunResult, StepStats};
pub use report::{render_text, RunReport, SessionCounts};
pub use runner::{FeederFactory, Population, SessionFeeder, Simulation};
pub use scenario::{Protocol, Scenario, Step, StepBuilder};
pub use session::{Session, StepLogEntry, Value};
pub use simulations::{crud_simulation, smoke_simulation, SimulationKind};
pub use template::Template;
pub use throttle::{Throttle, ThrottleProfile};
