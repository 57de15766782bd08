//! Simulation orchestration.
//!
//! ```text
//!  populations ──► merge_timelines ──► spawn at offset ──► Executor ──► Aggregator
//!                                          │                               │
//!                                   duration elapses                 all sessions done
//!                                          │                               │
//!                                   grace, then cancel ──────────────► assertions ──► RunReport
//! ```
//!
//! Arrivals at or after the run duration are never admitted. Sessions still
//! running once `duration + grace` has passed are cancelled through a
//! shared `watch` channel, and each records its unfinished step as
//! `Cancelled`. Assertions are evaluated once, after every session task
//! has been joined.

use crate::assertion::{evaluate_all, Assertion};
use crate::error::{BookloadError, BookloadResult};
use crate::executor::{Executor, SessionSummary};
use crate::feeder::{BookingFeeder, FeederRecord};
use crate::http::HttpClient;
use crate::injection::{merge_timelines, InjectionProfile};
use crate::metrics::Aggregator;
use crate::report::RunReport;
use crate::scenario::{Protocol, Scenario};
use crate::session::Session;
use crate::throttle::{Throttle, ThrottleProfile};
use chrono::{NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, warn};

/// A session's private record source
pub type SessionFeeder = Box<dyn Iterator<Item = FeederRecord> + Send>;

/// Builds the feeder for a session, given its id
pub type FeederFactory = Arc<dyn Fn(u64) -> SessionFeeder + Send + Sync>;

/// Default grace period after the run duration
pub const DEFAULT_GRACE: Duration = Duration::from_secs(10);

/// A scenario and the profile that injects it
#[derive(Debug, Clone)]
pub struct Population {
    /// What each session runs
    pub scenario: Scenario,
    /// When sessions start
    pub profile: InjectionProfile,
}

/// Everything needed to run a load test
#[derive(Clone)]
pub struct Simulation {
    name: String,
    protocol: Protocol,
    populations: Vec<Population>,
    throttle: Option<ThrottleProfile>,
    assertions: Vec<Assertion>,
    duration: Option<Duration>,
    grace: Duration,
    seed: Option<u64>,
    today: Option<NaiveDate>,
    feeder: Option<FeederFactory>,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("name", &self.name)
            .field("protocol", &self.protocol)
            .field("populations", &self.populations)
            .field("throttle", &self.throttle)
            .field("assertions", &self.assertions)
            .field("duration", &self.duration)
            .field("grace", &self.grace)
            .field("seed", &self.seed)
            .field("custom_feeder", &self.feeder.is_some())
            .finish()
    }
}

impl Simulation {
    /// Empty simulation against `protocol`
    pub fn new(name: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            name: name.into(),
            protocol,
            populations: Vec::new(),
            throttle: None,
            assertions: Vec::new(),
            duration: None,
            grace: DEFAULT_GRACE,
            seed: None,
            today: None,
            feeder: None,
        }
    }

    /// Inject `scenario` with `profile`
    #[must_use]
    pub fn population(mut self, scenario: Scenario, profile: InjectionProfile) -> Self {
        self.populations.push(Population { scenario, profile });
        self
    }

    /// Gate every request through a global throttle
    #[must_use]
    pub fn throttle(mut self, profile: ThrottleProfile) -> Self {
        self.throttle = Some(profile);
        self
    }

    /// Add an end-of-run assertion
    #[must_use]
    pub fn assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Stop admitting sessions after `duration`.
    ///
    /// Without a duration every scheduled session is admitted and the grace
    /// period counts from the last arrival.
    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// How long in-flight sessions may drain before they are cancelled
    #[must_use]
    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Seed every session's feeder, making data reproducible
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Anchor generated booking dates at `today`
    #[must_use]
    pub fn today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Replace the booking feeder
    #[must_use]
    pub fn feeder<F>(mut self, factory: F) -> Self
    where
        F: Fn(u64) -> SessionFeeder + Send + Sync + 'static,
    {
        self.feeder = Some(Arc::new(factory));
        self
    }

    /// Simulation name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request defaults
    #[must_use]
    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// Injected populations
    #[must_use]
    pub fn populations(&self) -> &[Population] {
        &self.populations
    }

    /// Throttle schedule, if any
    #[must_use]
    pub fn throttle_profile(&self) -> Option<&ThrottleProfile> {
        self.throttle.as_ref()
    }

    /// Configured assertions
    #[must_use]
    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    /// Check profiles and the throttle before running
    pub fn validate(&self) -> BookloadResult<()> {
        if self.populations.is_empty() {
            return Err(BookloadError::config(format!(
                "simulation {:?} injects no scenarios",
                self.name
            )));
        }
        for population in &self.populations {
            population.profile.validate()?;
        }
        if let Some(throttle) = &self.throttle {
            throttle.validate()?;
        }
        instant_after(Instant::now(), self.horizon()?)?;
        Ok(())
    }

    /// Longest the run can take: admission window plus grace
    fn horizon(&self) -> BookloadResult<Duration> {
        let admission = self.duration.unwrap_or_else(|| {
            self.populations
                .iter()
                .map(|p| p.profile.last_offset())
                .max()
                .unwrap_or_default()
        });
        admission.checked_add(self.grace).ok_or_else(|| {
            BookloadError::config(format!(
                "run window {admission:?} plus grace {:?} overflows",
                self.grace
            ))
        })
    }

    fn session_feeder(&self, session_id: u64) -> SessionFeeder {
        if let Some(factory) = &self.feeder {
            return factory(session_id);
        }
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(session_id)),
            None => StdRng::from_os_rng(),
        };
        match self.today {
            Some(today) => Box::new(BookingFeeder::with_today(rng, today)),
            None => Box::new(BookingFeeder::new(rng)),
        }
    }

    /// Run to completion and evaluate the assertions
    pub async fn run<C>(&self, client: C) -> BookloadResult<RunReport>
    where
        C: HttpClient + 'static,
    {
        self.validate()?;
        let started_at = Utc::now();
        let start = Instant::now();

        let throttle = self
            .throttle
            .map(|profile| Throttle::starting_at(profile, start))
            .transpose()?
            .map(Arc::new);
        let aggregator = Aggregator::new();
        let executor = Arc::new(Executor::new(
            Arc::new(client),
            self.protocol.clone(),
            throttle,
            aggregator.clone(),
        ));
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let timeline = merge_timelines(self.populations.iter().map(|p| &p.profile));
        info!(
            simulation = %self.name,
            sessions = timeline.len(),
            duration = ?self.duration,
            "run started"
        );

        let mut sessions = JoinSet::new();
        let mut last_arrival = Duration::ZERO;
        for arrival in timeline {
            if self.duration.is_some_and(|d| arrival.offset >= d) {
                continue;
            }
            tokio::time::sleep_until(instant_after(start, arrival.offset)?).await;
            last_arrival = arrival.offset;

            let population = &self.populations[arrival.population];
            let scenario = population.scenario.clone();
            let session = Session::new(arrival.session_id, scenario.name());
            let mut feeder = self.session_feeder(arrival.session_id);
            let executor = Arc::clone(&executor);
            let cancel = cancel_rx.clone();
            sessions.spawn(async move {
                executor
                    .run_session(&scenario, session, &mut *feeder, cancel)
                    .await
            });
        }

        let window = self.duration.unwrap_or(last_arrival);
        let drain_deadline = instant_after(start, window.saturating_add(self.grace))?;
        let mut summaries = Vec::new();
        let mut lost = 0_u64;
        let drained = tokio::time::timeout_at(
            drain_deadline,
            join_all(&mut sessions, &mut summaries, &mut lost),
        )
        .await;
        if drained.is_err() {
            warn!(
                remaining = sessions.len(),
                grace = ?self.grace,
                "grace period elapsed, cancelling sessions"
            );
            cancel_tx.send_replace(true);
            join_all(&mut sessions, &mut summaries, &mut lost).await;
        }
        if lost > 0 {
            warn!(lost, "session tasks ended without a summary");
        }

        let metrics = aggregator.snapshot();
        let verdict = evaluate_all(&self.assertions, &metrics);
        for outcome in &verdict.outcomes {
            info!(
                assertion = %outcome.description,
                actual = %outcome.actual,
                passed = outcome.passed,
                "assertion evaluated"
            );
        }
        info!(
            simulation = %self.name,
            requests = metrics.total(),
            success_rate = metrics.success_rate_percent(),
            passed = verdict.passed,
            "run finished"
        );

        summaries.sort_by_key(|s: &SessionSummary| s.session_id);
        Ok(RunReport::new(
            &self.name,
            started_at,
            start.elapsed(),
            metrics,
            summaries,
            verdict,
        ))
    }
}

fn instant_after(start: Instant, offset: Duration) -> BookloadResult<Instant> {
    start.checked_add(offset).ok_or_else(|| {
        BookloadError::config(format!("run window of {offset:?} is out of range"))
    })
}

async fn join_all(
    sessions: &mut JoinSet<SessionSummary>,
    summaries: &mut Vec<SessionSummary>,
    lost: &mut u64,
) {
    while let Some(joined) = sessions.join_next().await {
        match joined {
            Ok(summary) => summaries.push(summary),
            Err(err) => {
                warn!(error = %err, "session task failed");
                *lost += 1;
            }
        }
    }
}
