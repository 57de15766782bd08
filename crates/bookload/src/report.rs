//! Run reports: console text and JSON.

use crate::assertion::{AssertionOutcome, Verdict};
use crate::error::BookloadResult;
use crate::executor::{SessionOutcome, SessionSummary};
use crate::metrics::{FailureKind, Metrics, StepStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

/// Session counts by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
    /// Sessions that attempted every step
    pub completed: u64,
    /// Sessions stopped by a step-fatal error
    pub aborted: u64,
    /// Sessions cancelled at the end of the run
    pub cancelled: u64,
}

impl SessionCounts {
    fn tally(summaries: &[SessionSummary]) -> Self {
        let mut counts = Self::default();
        for summary in summaries {
            match summary.outcome {
                SessionOutcome::Completed => counts.completed += 1,
                SessionOutcome::Aborted { .. } => counts.aborted += 1,
                SessionOutcome::Cancelled { .. } => counts.cancelled += 1,
            }
        }
        counts
    }

    /// All sessions
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.completed + self.aborted + self.cancelled
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Simulation name
    pub simulation: String,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Run length in seconds
    pub elapsed_secs: f64,
    /// Results recorded
    pub total: u64,
    /// Successful results
    pub successful: u64,
    /// Failed results
    pub failed: u64,
    /// Success rate in percent
    pub success_rate: f64,
    /// Failed results by kind
    pub failures: BTreeMap<FailureKind, u64>,
    /// Statistics over all results
    pub global: StepStats,
    /// Statistics per step name
    pub steps: Vec<StepStats>,
    /// Session outcomes
    pub sessions: SessionCounts,
    /// Assertion outcomes, in declaration order
    pub assertions: Vec<AssertionOutcome>,
    /// Whether every assertion held
    pub passed: bool,
    /// Raw results
    #[serde(skip)]
    pub metrics: Metrics,
    /// Per-session detail
    #[serde(skip)]
    pub session_summaries: Vec<SessionSummary>,
}

impl RunReport {
    /// Assemble a report from a finished run
    #[must_use]
    pub fn new(
        simulation: &str,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        metrics: Metrics,
        session_summaries: Vec<SessionSummary>,
        verdict: Verdict,
    ) -> Self {
        let global = metrics.global_stats();
        Self {
            simulation: simulation.to_string(),
            started_at,
            elapsed_secs: elapsed.as_secs_f64(),
            total: metrics.total(),
            successful: metrics.successful(),
            failed: metrics.failed(),
            success_rate: metrics.success_rate_percent(),
            failures: global.failures.clone(),
            global,
            steps: metrics.step_stats(),
            sessions: SessionCounts::tally(&session_summaries),
            assertions: verdict.outcomes,
            passed: verdict.passed,
            metrics,
            session_summaries,
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> BookloadResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON report to `path`
    pub fn write_json(&self, path: &Path) -> BookloadResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Render a console summary
#[must_use]
pub fn render_text(report: &RunReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(88);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "Simulation: {}  ({:.1}s)",
        report.simulation, report.elapsed_secs
    );
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "{:<32} {:>7} {:>7} {:>7} {:>9} {:>9} {:>9}",
        "Step", "OK", "KO", "OK%", "p50 ms", "p95 ms", "max ms"
    );
    for stats in report.steps.iter().chain(std::iter::once(&report.global)) {
        let _ = writeln!(
            out,
            "{:<32} {:>7} {:>7} {:>7.2} {:>9.0} {:>9.0} {:>9.0}",
            truncate(&stats.name, 32),
            stats.successful,
            stats.count - stats.successful,
            stats.success_rate,
            stats.p50_ms,
            stats.p95_ms,
            stats.max_ms,
        );
    }

    if !report.failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failures:");
        for (kind, count) in &report.failures {
            let _ = writeln!(out, "  {:<14} {count}", kind.to_string());
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Sessions: {} completed, {} aborted, {} cancelled",
        report.sessions.completed, report.sessions.aborted, report.sessions.cancelled
    );

    if !report.assertions.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Assertions:");
        for outcome in &report.assertions {
            let mark = if outcome.passed { "PASS" } else { "FAIL" };
            let _ = writeln!(
                out,
                "  [{mark}] {}  (actual {})",
                outcome.description, outcome.actual
            );
        }
    }

    let _ = writeln!(out, "{rule}");
    let verdict = if report.passed { "PASSED" } else { "FAILED" };
    let _ = writeln!(out, "Result: {verdict}");
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
        cut.push('~');
        cut
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::assertion::{evaluate_all, Assertion};
    use crate::metrics::RunResult;

    fn report() -> RunReport {
        let metrics = Metrics::new(vec![
            RunResult::ok("s", "Ping", 0, 200, Duration::from_millis(40)),
            RunResult::failed("s", "Ping", 1, FailureKind::Cancelled, "grace elapsed"),
        ]);
        let summaries = vec![
            SessionSummary {
                session_id: 0,
                scenario: "s".to_string(),
                outcome: SessionOutcome::Completed,
                log: Vec::new(),
            },
            SessionSummary {
                session_id: 1,
                scenario: "s".to_string(),
                outcome: SessionOutcome::Cancelled {
                    step: "Ping".to_string(),
                },
                log: Vec::new(),
            },
        ];
        let verdict = evaluate_all(&[Assertion::success_rate_above(99.0)], &metrics);
        RunReport::new(
            "Smoke",
            Utc::now(),
            Duration::from_secs(3),
            metrics,
            summaries,
            verdict,
        )
    }

    #[test]
    fn test_report_totals() {
        let report = report();
        assert_eq!(report.total, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.sessions.total(), 2);
        assert_eq!(report.sessions.cancelled, 1);
        assert_eq!(report.failures.get(&FailureKind::Cancelled), Some(&1));
        assert!(!report.passed);
    }

    #[test]
    fn test_render_text() {
        let text = render_text(&report());
        assert!(text.contains("Simulation: Smoke"));
        assert!(text.contains("Cancelled"));
        assert!(text.contains("[FAIL] global: success rate > 99%"));
        assert!(text.trim_end().ends_with("Result: FAILED"));
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value = serde_json::from_str(&report().to_json().unwrap()).unwrap();
        assert_eq!(json["simulation"], "Smoke");
        assert_eq!(json["sessions"]["cancelled"], 1);
        assert_eq!(json["failures"]["cancelled"], 1);
        assert_eq!(json["passed"], false);
        assert!(json.get("metrics").is_none());
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report().write_json(&path).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("\"Smoke\""));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("UpdateBooking - Invalid Token", 10), "UpdateBoo~");
    }
}
