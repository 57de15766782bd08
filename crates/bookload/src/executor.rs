//! Runs one session through its scenario.
//!
//! Steps execute strictly in order. For each step the executor draws a
//! feeder record if the step feeds, renders the request, waits for a
//! throttle slot, sends it and evaluates the checks. Exactly one
//! [`RunResult`] is recorded per attempted step.
//!
//! | Failure        | Recorded as     | Session      |
//! |----------------|-----------------|--------------|
//! | transport      | `Transport`     | continues    |
//! | check mismatch | `Check`         | continues    |
//! | missing var    | `Interpolation` | stops        |
//! | feeder dry     | `Feeder`        | stops        |
//! | run cancelled  | `Cancelled`     | stops        |

use crate::check::ParsedResponse;
use crate::error::{FeederExhausted, InterpolationError, TransportError};
use crate::feeder::FeederRecord;
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::metrics::{Aggregator, FailureKind, RunResult};
use crate::scenario::{Protocol, Scenario, Step};
use crate::session::{Session, StepLogEntry};
use crate::throttle::Throttle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Every step was attempted
    Completed,
    /// A step-fatal error stopped the session
    Aborted {
        /// Step that could not be rendered
        step: String,
        /// Error message
        reason: String,
    },
    /// The run cancelled the session
    Cancelled {
        /// Step that was in flight
        step: String,
    },
}

/// What one session did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session identifier
    pub session_id: u64,
    /// Scenario name
    pub scenario: String,
    /// How it ended
    pub outcome: SessionOutcome,
    /// Step outcomes, in execution order
    pub log: Vec<StepLogEntry>,
}

/// Step-fatal errors
#[derive(Debug, Error)]
enum Fatal {
    #[error(transparent)]
    Interpolation(#[from] InterpolationError),
    #[error(transparent)]
    Feeder(#[from] FeederExhausted),
}

impl Fatal {
    const fn kind(&self) -> FailureKind {
        match self {
            Self::Interpolation(_) => FailureKind::Interpolation,
            Self::Feeder(_) => FailureKind::Feeder,
        }
    }
}

/// Executes sessions against a shared client, throttle and aggregator
pub struct Executor {
    client: Arc<dyn HttpClient>,
    protocol: Protocol,
    throttle: Option<Arc<Throttle>>,
    aggregator: Aggregator,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("protocol", &self.protocol)
            .field("throttle", &self.throttle)
            .field("recorded", &self.aggregator.len())
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Create an executor
    pub fn new(
        client: Arc<dyn HttpClient>,
        protocol: Protocol,
        throttle: Option<Arc<Throttle>>,
        aggregator: Aggregator,
    ) -> Self {
        Self {
            client,
            protocol,
            throttle,
            aggregator,
        }
    }

    /// Aggregator results are recorded into
    #[must_use]
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Run `session` through `scenario` until it completes, aborts or is
    /// cancelled through `cancel`
    pub async fn run_session<F>(
        &self,
        scenario: &Scenario,
        mut session: Session,
        feeder: &mut F,
        mut cancel: watch::Receiver<bool>,
    ) -> SessionSummary
    where
        F: Iterator<Item = FeederRecord> + ?Sized,
    {
        let session_id = session.id();
        debug!(
            session = session_id,
            scenario = scenario.name(),
            "session started"
        );
        let mut outcome = SessionOutcome::Completed;

        for step in scenario.steps() {
            let request = match self.prepare(step, &mut session, &mut *feeder) {
                Ok(request) => request,
                Err(fatal) => {
                    warn!(
                        session = session_id,
                        step = step.name(),
                        error = %fatal,
                        "step-fatal error, stopping session"
                    );
                    self.finish(
                        &mut session,
                        RunResult::failed(
                            scenario.name(),
                            step.name(),
                            session_id,
                            fatal.kind(),
                            fatal.to_string(),
                        ),
                    );
                    outcome = SessionOutcome::Aborted {
                        step: step.name().to_string(),
                        reason: fatal.to_string(),
                    };
                    break;
                }
            };

            let dispatched = tokio::select! {
                biased;
                () = cancelled(&mut cancel) => None,
                sent = self.dispatch(&request) => Some(sent),
            };

            let result = match dispatched {
                None => {
                    self.finish(
                        &mut session,
                        RunResult::failed(
                            scenario.name(),
                            step.name(),
                            session_id,
                            FailureKind::Cancelled,
                            "run duration and grace period elapsed",
                        ),
                    );
                    outcome = SessionOutcome::Cancelled {
                        step: step.name().to_string(),
                    };
                    break;
                }
                Some((Err(err), elapsed)) => RunResult::failed(
                    scenario.name(),
                    step.name(),
                    session_id,
                    FailureKind::Transport,
                    err.to_string(),
                )
                .with_latency(elapsed),
                Some((Ok(response), _)) => {
                    self.evaluate(scenario.name(), step, &response, &mut session)
                }
            };
            self.finish(&mut session, result);
        }

        debug!(session = session_id, outcome = ?outcome, "session finished");
        SessionSummary {
            session_id,
            scenario: scenario.name().to_string(),
            outcome,
            log: session.log().to_vec(),
        }
    }

    fn prepare<F>(
        &self,
        step: &Step,
        session: &mut Session,
        feeder: &mut F,
    ) -> Result<HttpRequest, Fatal>
    where
        F: Iterator<Item = FeederRecord> + ?Sized,
    {
        if step.feeds() {
            session.feed(feeder.next().ok_or(FeederExhausted)?);
        }
        let path = session.render(step.path())?;
        let headers = step
            .headers()
            .iter()
            .map(|(name, value)| session.render(value).map(|v| (name.clone(), v)))
            .collect::<Result<Vec<_>, InterpolationError>>()?;
        let body = step.body().map(|b| session.render(b)).transpose()?;

        Ok(HttpRequest {
            method: step.method(),
            url: self.protocol.url(&path),
            headers: self.protocol.merge_headers(headers),
            body,
        })
    }

    async fn dispatch(
        &self,
        request: &HttpRequest,
    ) -> (Result<HttpResponse, TransportError>, std::time::Duration) {
        if let Some(throttle) = &self.throttle {
            throttle.acquire().await;
        }
        let sent_at = Instant::now();
        let result = self.client.send(request).await;
        (result, sent_at.elapsed())
    }

    fn evaluate(
        &self,
        scenario: &str,
        step: &Step,
        response: &HttpResponse,
        session: &mut Session,
    ) -> RunResult {
        let parsed = ParsedResponse::new(response);
        let mut first_failure = None;
        for check in step.checks() {
            let result = check.evaluate(&parsed, session);
            if !result.passed && first_failure.is_none() {
                first_failure = Some(
                    result
                        .detail
                        .unwrap_or_else(|| format!("{} failed", result.check)),
                );
            }
        }

        match first_failure {
            None => RunResult::ok(
                scenario,
                step.name(),
                session.id(),
                response.status,
                response.latency,
            ),
            Some(detail) => {
                let id = session.id();
                RunResult::failed(scenario, step.name(), id, FailureKind::Check, detail)
                    .with_status(response.status)
                    .with_latency(response.latency)
            }
        }
    }

    fn finish(&self, session: &mut Session, result: RunResult) {
        debug!(
            session = result.session_id,
            step = %result.step,
            status = ?result.status,
            success = result.success,
            "step finished"
        );
        session.record(StepLogEntry {
            step: result.step.clone(),
            success: result.success,
            failure: result.failure,
        });
        self.aggregator.record(result);
    }
}

/// Resolves once `cancel` is set; never resolves if the sender is gone
/// without having cancelled
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}
