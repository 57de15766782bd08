//! Global throttle: one admission gate shared by every session.
//!
//! The permitted rate follows a ramp from 0 to the target over the ramp
//! duration, then holds at the target:
//!
//! ```text
//! r(t) = target * t / ramp      for t < ramp
//! r(t) = target                 for t >= ramp
//! ```
//!
//! Permits accrue continuously as the integral of `r(t)`:
//!
//! ```text
//! F(t) = target * t^2 / (2 * ramp)                 for t <= ramp
//! F(t) = target * ramp / 2 + target * (t - ramp)   for t > ramp
//! ```
//!
//! Unused permits are capped at one, so an idle gate cannot bank a burst.
//! A request that finds less than one permit waits until `F` has grown by
//! the shortfall, computed in closed form from `F⁻¹`. Waiters queue on a
//! fair (FIFO) `tokio::sync::Mutex` and sleep while holding it, so admissions
//! happen strictly in arrival order and each one is spaced at least
//! `1 / r(t)` after the previous. In any one-second window during the hold
//! phase at most `target + 1` requests are admitted.
//!
//! After `ramp + hold` has elapsed the gate keeps admitting at the target.

use crate::error::{BookloadError, BookloadResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Largest number of unused permits the gate retains
const BURST: f64 = 1.0;

/// Ramp-then-hold rate schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThrottleProfile {
    /// Steady-state requests per second
    pub target_rps: f64,
    /// Time to go from 0 to `target_rps`
    pub ramp: Duration,
    /// Time to hold `target_rps` after the ramp
    pub hold: Duration,
}

impl ThrottleProfile {
    /// Reach `target_rps` over `ramp`, then hold for `hold`
    #[must_use]
    pub const fn new(target_rps: f64, ramp: Duration, hold: Duration) -> Self {
        Self {
            target_rps,
            ramp,
            hold,
        }
    }

    /// Reject non-finite or non-positive targets
    pub fn validate(&self) -> BookloadResult<()> {
        if !self.target_rps.is_finite() || self.target_rps <= 0.0 {
            return Err(BookloadError::invalid_profile(format!(
                "throttle target must be a positive rate, got {}",
                self.target_rps
            )));
        }
        Ok(())
    }

    /// End of the hold phase, relative to run start
    #[must_use]
    pub fn end(&self) -> Duration {
        self.ramp + self.hold
    }

    /// Permitted rate `t` seconds into the run
    #[must_use]
    pub fn rate_at(&self, t: f64) -> f64 {
        let ramp = self.ramp.as_secs_f64();
        if t <= 0.0 && ramp > 0.0 {
            0.0
        } else if t < ramp {
            self.target_rps * t / ramp
        } else {
            self.target_rps
        }
    }

    /// Permits accrued between run start and `t` seconds
    #[must_use]
    pub fn cumulative(&self, t: f64) -> f64 {
        let t = t.max(0.0);
        let ramp = self.ramp.as_secs_f64();
        let target = self.target_rps;
        if ramp > 0.0 && t <= ramp {
            target * t * t / (2.0 * ramp)
        } else {
            target * ramp / 2.0 + target * (t - ramp)
        }
    }

    /// Earliest time at which `cumulative` reaches `permits`
    #[must_use]
    pub fn time_for(&self, permits: f64) -> f64 {
        let permits = permits.max(0.0);
        let ramp = self.ramp.as_secs_f64();
        let target = self.target_rps;
        let ramp_permits = target * ramp / 2.0;
        if permits <= ramp_permits && ramp > 0.0 {
            (2.0 * ramp * permits / target).sqrt()
        } else {
            ramp + (permits - ramp_permits) / target
        }
    }
}

#[derive(Debug)]
struct Gate {
    credit: f64,
    /// Seconds since start up to which `credit` has been accrued
    accrued_to: f64,
}

impl Gate {
    fn accrue(&mut self, profile: &ThrottleProfile, now: f64) {
        if now > self.accrued_to {
            let gained = profile.cumulative(now) - profile.cumulative(self.accrued_to);
            self.credit = (self.credit + gained).min(BURST);
            self.accrued_to = now;
        }
    }
}

/// The shared admission gate
#[derive(Debug)]
pub struct Throttle {
    profile: ThrottleProfile,
    start: Instant,
    gate: Mutex<Gate>,
    admitted: AtomicU64,
    waiting: AtomicUsize,
}

impl Throttle {
    /// Gate whose schedule starts now
    pub fn new(profile: ThrottleProfile) -> BookloadResult<Self> {
        Self::starting_at(profile, Instant::now())
    }

    /// Gate whose schedule starts at `start`
    pub fn starting_at(profile: ThrottleProfile, start: Instant) -> BookloadResult<Self> {
        profile.validate()?;
        Ok(Self {
            profile,
            start,
            gate: Mutex::new(Gate {
                credit: 0.0,
                accrued_to: 0.0,
            }),
            admitted: AtomicU64::new(0),
            waiting: AtomicUsize::new(0),
        })
    }

    /// The schedule this gate follows
    #[must_use]
    pub fn profile(&self) -> &ThrottleProfile {
        &self.profile
    }

    /// Requests admitted so far
    #[must_use]
    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    /// Requests currently queued for a slot
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Relaxed)
    }

    /// Permitted rate right now
    #[must_use]
    pub fn current_rate(&self) -> f64 {
        self.profile.rate_at(self.elapsed())
    }

    fn elapsed(&self) -> f64 {
        Instant::now()
            .saturating_duration_since(self.start)
            .as_secs_f64()
    }

    /// Wait for a slot.
    ///
    /// Cancel-safe: dropping the future gives up the place in the queue
    /// without consuming a permit.
    pub async fn acquire(&self) {
        self.waiting.fetch_add(1, Ordering::Relaxed);
        let _queued = WaitGuard(&self.waiting);

        let mut gate = self.gate.lock().await;
        gate.accrue(&self.profile, self.elapsed());

        if gate.credit < 1.0 {
            let needed = self.profile.cumulative(gate.accrued_to) + (1.0 - gate.credit);
            let at = self.profile.time_for(needed);
            tracing::debug!(
                wait_secs = at - gate.accrued_to,
                rate = self.profile.rate_at(gate.accrued_to),
                "throttle wait"
            );
            tokio::time::sleep_until(self.start + Duration::from_secs_f64(at)).await;
            gate.accrue(&self.profile, at.max(self.elapsed()));
        }

        gate.credit = (gate.credit - 1.0).max(0.0);
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }
}

struct WaitGuard<'a>(&'a AtomicUsize);

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
