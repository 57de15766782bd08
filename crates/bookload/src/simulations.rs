//! Reference Restful-Booker simulations.
//!
//! - [`crud_simulation`]: token, create, read, update and delete under a
//!   ramped population, plus a bad-token population expecting `403`.
//! - [`smoke_simulation`]: a single user pings and lists booking ids.

use crate::assertion::Assertion;
use crate::check::Check;
use crate::config::RunConfig;
use crate::error::{BookloadError, BookloadResult};
use crate::injection::InjectionProfile;
use crate::runner::Simulation;
use crate::scenario::{Protocol, Scenario, Step};
use crate::throttle::ThrottleProfile;
use std::str::FromStr;
use std::time::Duration;

/// Scenario name of the CRUD flow
pub const CRUD_HAPPY_PATH: &str = "CRUD Happy Path";
/// Scenario name of the bad-token flow
pub const CRUD_NEGATIVE: &str = "CRUD Negative - bad token";
/// Scenario name of the smoke flow
pub const SMOKE: &str = "Smoke - ping & list ids";

const AUTH_BODY: &str = r#"{"username":"admin","password":"password123"}"#;

const BOOKING_BODY: &str = r##"{
  "firstname": "#{firstname}",
  "lastname": "#{lastname}",
  "totalprice": #{totalprice},
  "depositpaid": #{depositpaid},
  "bookingdates": { "checkin": "#{checkin}", "checkout": "#{checkout}" },
  "additionalneeds": "#{needs}"
}"##;

/// Built-in simulations, selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationKind {
    /// CRUD happy path plus bad token
    Crud,
    /// Ping and list ids
    Smoke,
}

impl SimulationKind {
    /// Every built-in simulation
    pub const ALL: [Self; 2] = [Self::Crud, Self::Smoke];

    /// Name accepted on the command line
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crud => "crud",
            Self::Smoke => "smoke",
        }
    }

    /// Build the simulation from `config`
    pub fn build(self, config: &RunConfig) -> BookloadResult<Simulation> {
        match self {
            Self::Crud => crud_simulation(config),
            Self::Smoke => smoke_simulation(config),
        }
    }
}

impl FromStr for SimulationKind {
    type Err = BookloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| BookloadError::config(format!("unknown simulation {s:?}")))
    }
}

impl std::fmt::Display for SimulationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn create_token() -> BookloadResult<Step> {
    Step::post("CreateToken", "/auth")
        .body(AUTH_BODY)
        .check(Check::status(200))
        .try_check(Check::save("$.token", "token"))?
        .build()
}

fn create_booking() -> BookloadResult<Step> {
    Step::post("CreateBooking", "/booking")
        .feed()
        .body(BOOKING_BODY)
        .check(Check::status(200))
        .try_check(Check::save("$.bookingid", "bookingId"))?
        .build()
}

fn get_booking() -> BookloadResult<Step> {
    Step::get("GetBookingById", "/booking/#{bookingId}")
        .check(Check::status(200))
        .try_check(Check::field_exists("$.firstname"))?
        .build()
}

fn update_booking() -> BookloadResult<Step> {
    Step::put("UpdateBooking", "/booking/#{bookingId}")
        .feed()
        .header("Cookie", "token=#{token}")
        .body(BOOKING_BODY)
        .check(Check::status_in([200, 201, 202]))
        .build()
}

fn delete_booking() -> BookloadResult<Step> {
    Step::delete("DeleteBooking", "/booking/#{bookingId}")
        .header("Cookie", "token=#{token}")
        .check(Check::status_in([200, 201, 202, 204]))
        .build()
}

fn update_with_bad_token() -> BookloadResult<Step> {
    Step::put("UpdateBooking - Invalid Token", "/booking/#{bookingId}")
        .feed()
        .header("Cookie", "token=BADTOKEN")
        .body(BOOKING_BODY)
        .check(Check::status(403))
        .build()
}

/// Token, create, read, update, delete
pub fn crud_happy_path() -> BookloadResult<Scenario> {
    Ok(Scenario::new(
        CRUD_HAPPY_PATH,
        [
            create_token()?,
            create_booking()?,
            get_booking()?,
            update_booking()?,
            delete_booking()?,
        ],
    ))
}

/// Auth, create, then an update that must be refused
pub fn crud_negative() -> BookloadResult<Scenario> {
    Ok(Scenario::new(
        CRUD_NEGATIVE,
        [create_token()?, create_booking()?, update_with_bad_token()?],
    ))
}

/// Ping, then list booking ids
pub fn smoke_scenario() -> BookloadResult<Scenario> {
    Ok(Scenario::new(
        SMOKE,
        [
            Step::get("Ping", "/ping")
                .check(Check::status_in([200, 201]))
                .build()?,
            Step::get("GetBookingIds", "/booking")
                .check(Check::status(200))
                .build()?,
        ],
    ))
}

/// The CRUD load test.
///
/// `ramp_users` sessions of the happy path spread over the run duration,
/// one bad-token session per second for `negative_duration_secs`, a
/// throttle reaching `target_rps` in `throttle_ramp_secs` and holding it
/// for the run duration. Passes when more than 98% of requests succeed
/// and every step's p95 stays under one second.
pub fn crud_simulation(config: &RunConfig) -> BookloadResult<Simulation> {
    config.validate()?;
    let protocol = Protocol::new(&config.base_url)
        .content_type_json()
        .accept_json();

    let p95 = Assertion::latency_percentile(95.0, Duration::from_millis(1000));
    let simulation = Simulation::new("RestfulBookerCrudSimulation", protocol)
        .population(
            crud_happy_path()?,
            InjectionProfile::ramp(config.ramp_users, config.duration()),
        )
        .population(
            crud_negative()?,
            InjectionProfile::constant_rate(
                config.negative_rate,
                Duration::from_secs(config.negative_duration_secs),
            ),
        )
        .throttle(ThrottleProfile::new(
            config.target_rps,
            Duration::from_secs(config.throttle_ramp_secs),
            config.duration(),
        ))
        .assertion(Assertion::success_rate_above(98.0))
        .assertion(p95.for_all())
        .duration(config.duration())
        .grace(config.grace());

    Ok(with_seed(simulation, config))
}

/// The smoke test: one user, no throttle; passes when more than 99% of
/// requests succeed and p95 stays under 800ms
pub fn smoke_simulation(config: &RunConfig) -> BookloadResult<Simulation> {
    config.validate()?;
    let protocol = Protocol::new(&config.base_url).accept_json();
    let p95 = Assertion::latency_percentile(95.0, Duration::from_millis(800));

    let simulation = Simulation::new("SmokeSimulation", protocol)
        .population(smoke_scenario()?, InjectionProfile::at_once(1))
        .assertion(Assertion::success_rate_above(99.0))
        .assertion(p95)
        .duration(config.duration())
        .grace(config.grace());

    Ok(with_seed(simulation, config))
}

fn with_seed(simulation: Simulation, config: &RunConfig) -> Simulation {
    match config.seed {
        Some(seed) => simulation.seed(seed),
        None => simulation,
    }
}
