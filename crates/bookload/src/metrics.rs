//! Run results and the aggregator that collects them.
//!
//! Sessions stream one [`RunResult`] per step into a shared [`Aggregator`].
//! Once every session has finished the aggregator is frozen into
//! [`Metrics`], an immutable result set on which statistics are pure
//! functions: computing the same percentile twice yields the same value.
//!
//! Percentiles use the nearest-rank method:
//!
//! ```text
//! sorted = latencies ascending
//! index  = ceil(p / 100 * n) - 1, clamped to [0, n - 1]
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Why a step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection error, timeout or malformed response
    Transport,
    /// At least one check failed
    Check,
    /// A template referenced a missing variable
    Interpolation,
    /// The session's feeder ran out of records
    Feeder,
    /// The session was cancelled at the end of the run
    Cancelled,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => write!(f, "Transport"),
            Self::Check => write!(f, "Check"),
            Self::Interpolation => write!(f, "Interpolation"),
            Self::Feeder => write!(f, "Feeder"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Outcome of one step of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// Scenario the session was running
    pub scenario: String,
    /// Step name
    pub step: String,
    /// Session identifier
    pub session_id: u64,
    /// Response status, when a response arrived
    pub status: Option<u16>,
    /// Transport succeeded and every check passed
    pub success: bool,
    /// Failure classification, `None` on success
    pub failure: Option<FailureKind>,
    /// Request latency; `None` when no request was sent
    pub latency: Option<Duration>,
    /// When the step completed
    pub timestamp: DateTime<Utc>,
    /// First failure message
    pub detail: Option<String>,
}

impl RunResult {
    /// Successful result
    pub fn ok(
        scenario: impl Into<String>,
        step: impl Into<String>,
        session_id: u64,
        status: u16,
        latency: Duration,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            step: step.into(),
            session_id,
            status: Some(status),
            success: true,
            failure: None,
            latency: Some(latency),
            timestamp: Utc::now(),
            detail: None,
        }
    }

    /// Failed result
    pub fn failed(
        scenario: impl Into<String>,
        step: impl Into<String>,
        session_id: u64,
        kind: FailureKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            step: step.into(),
            session_id,
            status: None,
            success: false,
            failure: Some(kind),
            latency: None,
            timestamp: Utc::now(),
            detail: Some(detail.into()),
        }
    }

    /// Attach a response status
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach a latency
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

/// Thread-safe, append-only collector. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    results: Arc<Mutex<Vec<RunResult>>>,
}

impl Aggregator {
    /// Create an empty aggregator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result
    pub fn record(&self, result: RunResult) {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result);
    }

    /// Results recorded so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze the current contents
    #[must_use]
    pub fn snapshot(&self) -> Metrics {
        Metrics::new(
            self.results
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        )
    }
}

/// Immutable, finished result set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    results: Vec<RunResult>,
}

impl Metrics {
    /// Wrap a finished result set
    #[must_use]
    pub fn new(results: Vec<RunResult>) -> Self {
        Self { results }
    }

    /// All results, in recording order
    #[must_use]
    pub fn results(&self) -> &[RunResult] {
        &self.results
    }

    /// Total results
    #[must_use]
    pub fn total(&self) -> u64 {
        self.results.len() as u64
    }

    /// Successful results
    #[must_use]
    pub fn successful(&self) -> u64 {
        self.results.iter().filter(|r| r.success).count() as u64
    }

    /// Failed results
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.total() - self.successful()
    }

    /// Failed results of one kind
    #[must_use]
    pub fn failed_with(&self, kind: FailureKind) -> u64 {
        self.results
            .iter()
            .filter(|r| r.failure == Some(kind))
            .count() as u64
    }

    /// `100 * successful / total`; an empty set counts as 100
    #[must_use]
    pub fn success_rate_percent(&self) -> f64 {
        success_rate(self.successful(), self.total())
    }

    /// Nearest-rank percentile of latencies of results that sent a request.
    ///
    /// Returns `ZERO` when no request was sent.
    #[must_use]
    pub fn percentile(&self, p: f64) -> Duration {
        nearest_rank(&self.sorted_latencies(), p)
    }

    fn sorted_latencies(&self) -> Vec<Duration> {
        let mut latencies: Vec<Duration> = self.results.iter().filter_map(|r| r.latency).collect();
        latencies.sort_unstable();
        latencies
    }

    /// Results grouped by step name
    #[must_use]
    pub fn by_step(&self) -> BTreeMap<String, Self> {
        let mut groups: BTreeMap<String, Vec<RunResult>> = BTreeMap::new();
        for result in &self.results {
            groups
                .entry(result.step.clone())
                .or_default()
                .push(result.clone());
        }
        groups
            .into_iter()
            .map(|(step, results)| (step, Self::new(results)))
            .collect()
    }

    /// Per-step statistics, ordered by step name
    #[must_use]
    pub fn step_stats(&self) -> Vec<StepStats> {
        self.by_step()
            .iter()
            .map(|(name, group)| StepStats::from_metrics(name, group))
            .collect()
    }

    /// Statistics over every result
    #[must_use]
    pub fn global_stats(&self) -> StepStats {
        StepStats::from_metrics("Global", self)
    }
}

fn success_rate(successful: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        successful as f64 * 100.0 / total as f64
    }
}

/// Nearest-rank percentile of an ascending slice; `ZERO` when empty
#[must_use]
pub fn nearest_rank(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let n = sorted.len();
    let rank = (p * n as f64 / 100.0).ceil();
    let index = if rank.is_nan() || rank < 1.0 {
        0
    } else {
        (rank as usize - 1).min(n - 1)
    };
    sorted[index]
}

/// Per-step statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStats {
    /// Step name
    pub name: String,
    /// Result count
    pub count: u64,
    /// Successful results
    pub successful: u64,
    /// Failures by kind
    pub failures: BTreeMap<FailureKind, u64>,
    /// Success rate in percent
    pub success_rate: f64,
    /// Min latency in ms
    pub min_ms: f64,
    /// Mean latency in ms
    pub mean_ms: f64,
    /// Max latency in ms
    pub max_ms: f64,
    /// p50 latency in ms
    pub p50_ms: f64,
    /// p95 latency in ms
    pub p95_ms: f64,
    /// p99 latency in ms
    pub p99_ms: f64,
}

impl StepStats {
    /// Compute statistics for a result set
    #[must_use]
    pub fn from_metrics(name: &str, metrics: &Metrics) -> Self {
        let latencies = metrics.sorted_latencies();
        let mut failures = BTreeMap::new();
        for kind in metrics.results.iter().filter_map(|r| r.failure) {
            *failures.entry(kind).or_insert(0) += 1;
        }
        let mean_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().map(|d| ms(*d)).sum::<f64>() / latencies.len() as f64
        };

        Self {
            name: name.to_string(),
            count: metrics.total(),
            successful: metrics.successful(),
            failures,
            success_rate: metrics.success_rate_percent(),
            min_ms: latencies.first().map_or(0.0, |d| ms(*d)),
            mean_ms,
            max_ms: latencies.last().map_or(0.0, |d| ms(*d)),
            p50_ms: ms(nearest_rank(&latencies, 50.0)),
            p95_ms: ms(nearest_rank(&latencies, 95.0)),
            p99_ms: ms(nearest_rank(&latencies, 99.0)),
        }
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ok(step: &str, latency_ms: u64) -> RunResult {
        RunResult::ok("s", step, 0, 200, Duration::from_millis(latency_ms))
    }

    #[test]
    fn test_empty_success_rate_is_100() {
        let metrics = Metrics::default();
        assert_eq!(metrics.success_rate_percent(), 100.0);
        assert_eq!(metrics.percentile(95.0), Duration::ZERO);
    }

    #[test]
    fn test_nine_of_ten() {
        let aggregator = Aggregator::new();
        for _ in 0..9 {
            aggregator.record(ok("Ping", 10));
        }
        aggregator.record(RunResult::failed(
            "s",
            "Ping",
            0,
            FailureKind::Transport,
            "connection refused",
        ));
        let metrics = aggregator.snapshot();
        assert_eq!(metrics.total(), 10);
        assert_eq!(metrics.success_rate_percent(), 90.0);
        assert_eq!(metrics.failed_with(FailureKind::Transport), 1);
    }

    #[test]
    fn test_p95_nearest_rank() {
        let metrics = Metrics::new((1..=100).map(|i| ok("Read", i * 10)).collect());
        assert_eq!(metrics.percentile(95.0), Duration::from_millis(950));
        assert_eq!(metrics.percentile(50.0), Duration::from_millis(500));
        assert_eq!(metrics.percentile(100.0), Duration::from_millis(1000));
        assert_eq!(metrics.percentile(0.0), Duration::from_millis(10));
    }

    #[test]
    fn test_nearest_rank_small_sets() {
        let one = [Duration::from_millis(42)];
        assert_eq!(nearest_rank(&one, 99.0), one[0]);
        let three = [1, 2, 3].map(Duration::from_millis);
        assert_eq!(nearest_rank(&three, 34.0), Duration::from_millis(2));
        assert_eq!(nearest_rank(&three, 33.0), Duration::from_millis(1));
        assert_eq!(nearest_rank(&three, 150.0), Duration::from_millis(3));
    }

    #[test]
    fn test_unsent_requests_have_no_latency() {
        let metrics = Metrics::new(vec![
            ok("Read", 100),
            RunResult::failed("s", "Read", 1, FailureKind::Interpolation, "token"),
        ]);
        assert_eq!(metrics.percentile(1.0), Duration::from_millis(100));
        assert_eq!(metrics.success_rate_percent(), 50.0);
    }

    #[test]
    fn test_step_stats() {
        let failed = RunResult::failed("s", "CreateBooking", 0, FailureKind::Check, "500")
            .with_status(500)
            .with_latency(Duration::from_millis(50));
        let metrics = Metrics::new(vec![ok("CreateToken", 10), ok("CreateToken", 30), failed]);
        let stats = metrics.step_stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "CreateBooking");
        assert_eq!(stats[0].failures.get(&FailureKind::Check), Some(&1));
        assert_eq!(stats[1].count, 2);
        assert!((stats[1].mean_ms - 20.0).abs() < 1e-9);
        assert_eq!(stats[1].max_ms, 30.0);
    }

    #[test]
    fn test_clones_share_store() {
        let a = Aggregator::new();
        let b = a.clone();
        b.record(ok("Ping", 1));
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_concurrent_recording() {
        let aggregator = Aggregator::new();
        std::thread::scope(|scope| {
            for t in 0..8 {
                let aggregator = aggregator.clone();
                scope.spawn(move || {
                    for i in 0..100 {
                        let result = RunResult::ok("s", "Ping", t, 200, Duration::from_millis(i));
                        aggregator.record(result);
                    }
                });
            }
        });
        assert_eq!(aggregator.len(), 800);
    }

    proptest! {
        #[test]
        fn prop_percentile_idempotent(
            latencies in proptest::collection::vec(0u64..5000, 0..200),
            p in 0.0f64..=100.0,
        ) {
            let metrics = Metrics::new(latencies.iter().map(|l| ok("x", *l)).collect());
            prop_assert_eq!(metrics.percentile(p), metrics.percentile(p));
        }

        #[test]
        fn prop_percentile_is_a_sample(
            latencies in proptest::collection::vec(0u64..5000, 1..200),
            p in 0.0f64..=100.0,
        ) {
            let metrics = Metrics::new(latencies.iter().map(|l| ok("x", *l)).collect());
            let value = metrics.percentile(p).as_millis() as u64;
            prop_assert!(latencies.contains(&value));
        }
    }
}
