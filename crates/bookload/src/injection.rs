//! Injection profiles and the merged arrival timeline.
//!
//! A profile answers "how many sessions start, and when". Offsets are pure
//! functions of the profile, so the same profile always produces the same
//! schedule:
//!
//! ```text
//! at-once(n)               offset(i) = 0
//! ramp(n, D)               offset(i) = i * D / n           for i in [0, n)
//! constant-rate(r, D)      offset(i) = i / r               for i in [0, floor(D * r))
//! ```

use crate::error::{BookloadError, BookloadResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How many sessions a population starts, and when
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InjectionProfile {
    /// All sessions start immediately
    AtOnce {
        /// Session count
        users: u32,
    },
    /// Sessions spread evenly across a duration
    Ramp {
        /// Session count
        users: u32,
        /// Window the starts are spread over
        #[serde(with = "duration_secs")]
        duration: Duration,
    },
    /// A fixed arrival rate for a duration
    ConstantRate {
        /// Arrivals per second
        rate: f64,
        /// How long arrivals continue
        #[serde(with = "duration_secs")]
        duration: Duration,
    },
}

impl InjectionProfile {
    /// `at-once(n)`
    #[must_use]
    pub const fn at_once(users: u32) -> Self {
        Self::AtOnce { users }
    }

    /// `ramp(n, duration)`
    #[must_use]
    pub const fn ramp(users: u32, duration: Duration) -> Self {
        Self::Ramp { users, duration }
    }

    /// `constant-rate(rate, duration)`
    #[must_use]
    pub const fn constant_rate(rate: f64, duration: Duration) -> Self {
        Self::ConstantRate { rate, duration }
    }

    /// Reject non-finite or non-positive rates
    pub fn validate(&self) -> BookloadResult<()> {
        match self {
            Self::ConstantRate { rate, .. } if !rate.is_finite() || *rate <= 0.0 => {
                let msg = format!("arrival rate must be positive, got {rate}");
                Err(BookloadError::invalid_profile(msg))
            }
            _ => Ok(()),
        }
    }

    /// Number of sessions this profile starts
    #[must_use]
    pub fn session_count(&self) -> u64 {
        match *self {
            Self::AtOnce { users } | Self::Ramp { users, .. } => u64::from(users),
            Self::ConstantRate { rate, duration } => constant_rate_count(rate, duration),
        }
    }

    /// Start offset of the `i`-th session, or `None` past the end
    #[must_use]
    pub fn offset(&self, i: u64) -> Option<Duration> {
        if i >= self.session_count() {
            return None;
        }
        Some(match *self {
            Self::AtOnce { .. } => Duration::ZERO,
            Self::Ramp { users, duration } => {
                let nanos = duration.as_nanos() * u128::from(i) / u128::from(users);
                duration_from_nanos(nanos)
            }
            Self::ConstantRate { rate, .. } => Duration::from_secs_f64(i as f64 / rate),
        })
    }

    /// Every start offset, in order
    pub fn offsets(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.session_count())
            .filter_map(move |i| self.offset(i))
    }

    /// Offset of the last start, `ZERO` when nothing starts
    #[must_use]
    pub fn last_offset(&self) -> Duration {
        self.session_count()
            .checked_sub(1)
            .and_then(|i| self.offset(i))
            .unwrap_or(Duration::ZERO)
    }
}

fn constant_rate_count(rate: f64, duration: Duration) -> u64 {
    if !rate.is_finite() || rate <= 0.0 {
        return 0;
    }
    // floor(D * r); the epsilon keeps products such as 0.29 * 100 from
    // landing just under the integer they denote.
    (duration.as_secs_f64() * rate + 1e-9).floor().max(0.0) as u64
}

fn duration_from_nanos(nanos: u128) -> Duration {
    let secs = (nanos / 1_000_000_000) as u64;
    let sub = (nanos % 1_000_000_000) as u32;
    Duration::new(secs, sub)
}

/// One scheduled session start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrival {
    /// Run-wide session identifier
    pub session_id: u64,
    /// Index of the population this session belongs to
    pub population: usize,
    /// Start offset relative to run start
    pub offset: Duration,
}

/// Merge the schedules of several populations into one timeline.
///
/// The result is ordered by offset; ties keep population order, then
/// session order. Session ids are assigned in timeline order starting at 0.
pub fn merge_timelines<'a, I>(profiles: I) -> Vec<Arrival>
where
    I: IntoIterator<Item = &'a InjectionProfile>,
{
    let mut timeline: Vec<Arrival> = profiles
        .into_iter()
        .enumerate()
        .flat_map(|(population, profile)| {
            profile.offsets().map(move |offset| Arrival {
                session_id: 0,
                population,
                offset,
            })
        })
        .collect();
    timeline.sort_by_key(|a| a.offset);
    for (id, arrival) in timeline.iter_mut().enumerate() {
        arrival.session_id = id as u64;
    }
    timeline
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
