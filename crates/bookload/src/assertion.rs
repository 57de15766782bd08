//! End-of-run assertions over aggregated metrics.
//!
//! Assertions are evaluated once, after every session has finished or been
//! cancelled. The run verdict is the conjunction of all outcomes.

use crate::metrics::Metrics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which results an assertion looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Every result of the run
    #[default]
    Global,
    /// Each step name separately; passes only if every step passes
    ForAll,
}

/// Success-rate comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "percent", rename_all = "snake_case")]
pub enum Bound {
    /// `rate >= threshold`
    AtLeast(f64),
    /// `rate > threshold`
    GreaterThan(f64),
}

impl Bound {
    /// Whether `actual` satisfies the bound
    #[must_use]
    pub fn holds(self, actual: f64) -> bool {
        match self {
            Self::AtLeast(threshold) => actual >= threshold,
            Self::GreaterThan(threshold) => actual > threshold,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtLeast(t) => write!(f, ">= {t}%"),
            Self::GreaterThan(t) => write!(f, "> {t}%"),
        }
    }
}

/// A post-run threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Assertion {
    /// Percentage of successful results
    SuccessRate {
        /// Which results
        #[serde(default)]
        scope: Scope,
        /// Comparison
        bound: Bound,
    },
    /// Nearest-rank latency percentile, strictly below a threshold
    LatencyPercentile {
        /// Which results
        #[serde(default)]
        scope: Scope,
        /// Percentile in `[0, 100]`
        percentile: f64,
        /// Exclusive upper bound
        #[serde(with = "millis")]
        below: Duration,
    },
}

impl Assertion {
    /// `success rate >= percent`
    #[must_use]
    pub const fn success_rate_at_least(percent: f64) -> Self {
        Self::SuccessRate {
            scope: Scope::Global,
            bound: Bound::AtLeast(percent),
        }
    }

    /// `success rate > percent`
    #[must_use]
    pub const fn success_rate_above(percent: f64) -> Self {
        Self::SuccessRate {
            scope: Scope::Global,
            bound: Bound::GreaterThan(percent),
        }
    }

    /// `percentile(p) < below`
    #[must_use]
    pub const fn latency_percentile(percentile: f64, below: Duration) -> Self {
        Self::LatencyPercentile {
            scope: Scope::Global,
            percentile,
            below,
        }
    }

    /// Apply per step instead of globally
    #[must_use]
    pub const fn for_all(self) -> Self {
        self.with_scope(Scope::ForAll)
    }

    /// Replace the scope
    #[must_use]
    pub const fn with_scope(self, scope: Scope) -> Self {
        match self {
            Self::SuccessRate { bound, .. } => Self::SuccessRate { scope, bound },
            Self::LatencyPercentile {
                percentile, below, ..
            } => Self::LatencyPercentile {
                scope,
                percentile,
                below,
            },
        }
    }

    /// Scope of this assertion
    #[must_use]
    pub const fn scope(&self) -> Scope {
        match self {
            Self::SuccessRate { scope, .. } | Self::LatencyPercentile { scope, .. } => *scope,
        }
    }

    /// Human-readable statement, e.g. `global: success rate > 95%`
    #[must_use]
    pub fn description(&self) -> String {
        match self.scope() {
            Scope::Global => self.describe("global"),
            Scope::ForAll => self.describe("for all"),
        }
    }

    /// Evaluate against a finished result set
    #[must_use]
    pub fn evaluate(&self, metrics: &Metrics) -> AssertionOutcome {
        match self.scope() {
            Scope::Global => self.evaluate_group("global", metrics),
            Scope::ForAll => {
                let groups = metrics.by_step();
                let outcomes: Vec<_> = groups
                    .iter()
                    .map(|(step, group)| self.evaluate_group(step, group))
                    .collect();
                // The worst group speaks for the assertion
                match outcomes.iter().find(|o| !o.passed) {
                    Some(failed) => AssertionOutcome {
                        description: self.describe("for all"),
                        ..failed.clone()
                    },
                    None => AssertionOutcome {
                        description: self.describe("for all"),
                        passed: true,
                        actual: format!("{} steps passed", outcomes.len()),
                        expected: self.expected(),
                    },
                }
            }
        }
    }

    fn evaluate_group(&self, label: &str, metrics: &Metrics) -> AssertionOutcome {
        match *self {
            Self::SuccessRate { bound, .. } => {
                let actual = metrics.success_rate_percent();
                AssertionOutcome {
                    description: self.describe(label),
                    passed: bound.holds(actual),
                    actual: format!("{label}: {actual:.2}%"),
                    expected: self.expected(),
                }
            }
            Self::LatencyPercentile {
                percentile, below, ..
            } => {
                let actual = metrics.percentile(percentile);
                AssertionOutcome {
                    description: self.describe(label),
                    passed: actual < below,
                    actual: format!("{label}: {}ms", actual.as_millis()),
                    expected: self.expected(),
                }
            }
        }
    }

    fn describe(&self, label: &str) -> String {
        match self {
            Self::SuccessRate { .. } => format!("{label}: success rate {}", self.expected()),
            Self::LatencyPercentile { percentile, .. } => {
                format!("{label}: p{percentile} response time {}", self.expected())
            }
        }
    }

    fn expected(&self) -> String {
        match self {
            Self::SuccessRate { bound, .. } => bound.to_string(),
            Self::LatencyPercentile { below, .. } => format!("< {}ms", below.as_millis()),
        }
    }
}

/// Result of one assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionOutcome {
    /// What was asserted
    pub description: String,
    /// Whether it held
    pub passed: bool,
    /// Observed value (for `ForAll`, the first failing step)
    pub actual: String,
    /// Threshold
    pub expected: String,
}

/// Every outcome plus the overall verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// One outcome per assertion, in declaration order
    pub outcomes: Vec<AssertionOutcome>,
    /// Conjunction of all outcomes
    pub passed: bool,
}

/// Evaluate every assertion; an empty list passes
#[must_use]
pub fn evaluate_all(assertions: &[Assertion], metrics: &Metrics) -> Verdict {
    let outcomes: Vec<_> = assertions.iter().map(|a| a.evaluate(metrics)).collect();
    let passed = outcomes.iter().all(|o| o.passed);
    Verdict { outcomes, passed }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        s.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
