//! End-to-end runs against an in-memory booking service.
//!
//! Every test uses tokio's paused clock, so ramps, throttles and grace
//! periods complete instantly while keeping their relative timing.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use bookload::{
    Assertion, Check, FailureKind, FeederRecord, HttpClient, HttpMethod, HttpRequest, HttpResponse,
    InjectionProfile, Protocol, RunConfig, Scenario, SessionFeeder, SessionOutcome, Simulation,
    Step, TransportError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const VALID_TOKEN: &str = "abc123";

/// Minimal Restful-Booker lookalike
#[derive(Default)]
struct FakeBooker {
    next_id: AtomicU64,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeBooker {
    fn reply(status: u16, body: impl Into<String>) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.into(),
            latency: Duration::from_millis(5),
        }
    }

    fn authorized(request: &HttpRequest) -> bool {
        request
            .header("Cookie")
            .is_some_and(|cookie| cookie == format!("token={VALID_TOKEN}"))
    }

    fn sent(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for FakeBooker {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        tokio::time::sleep(Duration::from_millis(5)).await;

        let path = request
            .url
            .strip_prefix("http://booker.test")
            .unwrap_or(&request.url);
        let response = match (request.method, path) {
            (HttpMethod::Get, "/ping") => Self::reply(201, "Created"),
            (HttpMethod::Post, "/auth") => {
                let body = format!(r#"{{"token":"{VALID_TOKEN}"}}"#);
                Self::reply(200, body)
            }
            (HttpMethod::Get, "/booking") => Self::reply(200, r#"[{"bookingid":1}]"#),
            (HttpMethod::Post, "/booking") => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
                let raw = request.body.as_deref().unwrap_or_default();
                let booking = serde_json::from_str::<serde_json::Value>(raw)
                    .map_err(|e| TransportError::Body(e.to_string()))?;
                let body = serde_json::json!({ "bookingid": id, "booking": booking });
                Self::reply(200, body.to_string())
            }
            (HttpMethod::Get, p) if p.starts_with("/booking/") => {
                Self::reply(200, r#"{"firstname":"User1","lastname":"Perf1"}"#)
            }
            (HttpMethod::Put, p) if p.starts_with("/booking/") => {
                if Self::authorized(request) {
                    Self::reply(200, request.body.clone().unwrap_or_default())
                } else {
                    Self::reply(403, "Forbidden")
                }
            }
            (HttpMethod::Delete, p) if p.starts_with("/booking/") => {
                if Self::authorized(request) {
                    Self::reply(201, "Created")
                } else {
                    Self::reply(403, "Forbidden")
                }
            }
            _ => Self::reply(404, "Not Found"),
        };
        Ok(response)
    }
}

fn config() -> RunConfig {
    RunConfig {
        base_url: "http://booker.test".to_string(),
        duration_secs: 10,
        ramp_users: 3,
        throttle_ramp_secs: 2,
        seed: Some(7),
        ..RunConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_crud_simulation_passes_against_healthy_service() {
    let service = Arc::new(FakeBooker::default());
    let report = bookload::crud_simulation(&config())
        .unwrap()
        .run(Arc::clone(&service))
        .await
        .unwrap();

    // 3 happy-path sessions of 5 steps, 10 negative sessions of 3 steps
    assert_eq!(report.total, 3 * 5 + 10 * 3);
    assert_eq!(report.sessions.completed, 13);
    assert_eq!(report.success_rate, 100.0);
    assert!(report.passed, "{:?}", report.assertions);

    let negative = report
        .steps
        .iter()
        .find(|s| s.name == "UpdateBooking - Invalid Token")
        .unwrap();
    assert_eq!(negative.successful, 10);

    // Correlated values reached the wire
    let sent = service.sent();
    let updates: Vec<_> = sent.iter().filter(|r| r.method == HttpMethod::Put).collect();
    assert_eq!(updates.len(), 13);
    let with_token = updates
        .iter()
        .filter(|r| r.header("Cookie") == Some("token=abc123"))
        .count();
    assert_eq!(with_token, 3);
    assert!(updates.iter().all(|r| !r.url.contains("#{")));
    let json = Some("application/json");
    assert!(sent.iter().all(|r| r.header("Accept") == json));
}

#[tokio::test(start_paused = true)]
async fn test_feeder_values_render_into_body() {
    let service = Arc::new(FakeBooker::default());
    bookload::crud_simulation(&config().with_ramp_users(1))
        .unwrap()
        .run(Arc::clone(&service))
        .await
        .unwrap();

    let create = service
        .sent()
        .into_iter()
        .find(|r| r.method == HttpMethod::Post && r.url.ends_with("/booking"))
        .unwrap();
    let raw = create.body.as_deref().unwrap();
    let body: serde_json::Value = serde_json::from_str(raw).unwrap();
    let price = body["totalprice"].as_i64().unwrap();
    assert!((50..500).contains(&price));
    assert!(body["depositpaid"].is_boolean());
    assert!(body["firstname"].as_str().unwrap().starts_with("User"));
    let checkin = body["bookingdates"]["checkin"].as_str().unwrap();
    let checkout = body["bookingdates"]["checkout"].as_str().unwrap();
    assert!(checkout > checkin);
}

#[tokio::test(start_paused = true)]
async fn test_missing_token_stops_session() {
    let service = Arc::new(FakeBooker::default());
    let get = Step::get("GetBooking", "/booking/1")
        .header("Cookie", "token=#{token}")
        .check(Check::status(200))
        .build()
        .unwrap();
    let ping = Step::get("Ping", "/ping").build().unwrap();
    let scenario = Scenario::new("no auth", [get, ping]);
    let report = Simulation::new("interpolation", Protocol::new("http://booker.test"))
        .population(scenario, InjectionProfile::at_once(1))
        .run(Arc::clone(&service))
        .await
        .unwrap();

    assert!(service.sent().is_empty());
    let summary = &report.session_summaries[0];
    assert!(matches!(summary.outcome, SessionOutcome::Aborted { .. }));
    assert_eq!(summary.log.len(), 1);
    assert_eq!(summary.log[0].failure, Some(FailureKind::Interpolation));
    assert_eq!(report.sessions.aborted, 1);
    assert_eq!(report.total, 1);
}

/// Fails the tenth request with a connection error
struct TenthFails {
    calls: AtomicU64,
}

#[async_trait]
impl HttpClient for TenthFails {
    async fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 9 {
            return Err(TransportError::Connect("connection refused".to_string()));
        }
        Ok(FakeBooker::reply(200, "{}"))
    }
}

#[tokio::test(start_paused = true)]
async fn test_one_transport_failure_in_ten_fails_95_percent() {
    let ping = Step::get("Ping", "/ping")
        .check(Check::status(200))
        .build()
        .unwrap();
    let scenario = Scenario::new("ping", [ping]);
    let rate = InjectionProfile::constant_rate(10.0, Duration::from_secs(1));
    let report = Simulation::new("ninety", Protocol::new("http://booker.test"))
        .population(scenario, rate)
        .assertion(Assertion::success_rate_above(95.0))
        .run(TenthFails {
            calls: AtomicU64::new(0),
        })
        .await
        .unwrap();

    assert_eq!(report.total, 10);
    assert_eq!(report.success_rate, 90.0);
    assert_eq!(report.failures.get(&FailureKind::Transport), Some(&1));
    assert!(!report.passed);
    assert_eq!(report.assertions[0].actual, "global: 90.00%");
    // A transport failure does not abort the session
    assert_eq!(report.sessions.completed, 10);
}

/// Records when each session's requests start and end
#[derive(Default)]
struct Timeline {
    events: Mutex<Vec<(i64, &'static str, String)>>,
}

impl Timeline {
    fn log(&self, sid: i64, kind: &'static str, path: String) {
        self.events.lock().unwrap().push((sid, kind, path));
    }
}

#[async_trait]
impl HttpClient for Timeline {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let sid: i64 = request.header("X-Session").unwrap().parse().unwrap();
        let path = request.url.rsplit('/').next().unwrap().to_string();
        self.log(sid, "start", path.clone());
        // Later sessions answer faster, so sessions interleave
        tokio::time::sleep(Duration::from_millis(50 - 4 * sid as u64)).await;
        self.log(sid, "end", path);
        Ok(FakeBooker::reply(200, "{}"))
    }
}

#[tokio::test(start_paused = true)]
async fn test_steps_run_sequentially_within_each_session() {
    let step = |name: &str| {
        Step::get(name, format!("/{name}"))
            .header("X-Session", "#{sid}")
            .check(Check::status(200))
            .build()
            .unwrap()
    };
    let first = Step::get("a", "/a")
        .feed()
        .header("X-Session", "#{sid}")
        .build()
        .unwrap();
    let scenario = Scenario::new("seq", [first, step("b"), step("c")]);
    let client = Arc::new(Timeline::default());

    let report = Simulation::new("sequential", Protocol::new("http://booker.test"))
        .population(scenario, InjectionProfile::at_once(8))
        .feeder(|id| -> SessionFeeder {
            let record = FeederRecord::new().with("sid", id as i64);
            Box::new(std::iter::repeat(record))
        })
        .run(Arc::clone(&client))
        .await
        .unwrap();
    assert_eq!(report.total, 24);

    let events = client.events.lock().unwrap();
    let mut per_session: HashMap<i64, Vec<(&str, &str)>> = HashMap::new();
    for (sid, kind, path) in events.iter() {
        per_session
            .entry(*sid)
            .or_default()
            .push((*kind, path.as_str()));
    }
    assert_eq!(per_session.len(), 8);
    for trace in per_session.values() {
        assert_eq!(
            trace,
            &vec![
                ("start", "a"),
                ("end", "a"),
                ("start", "b"),
                ("end", "b"),
                ("start", "c"),
                ("end", "c"),
            ]
        );
    }
}

/// Never answers
struct BlackHole;

#[async_trait]
impl HttpClient for BlackHole {
    async fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_hung_sessions_are_cancelled_after_grace() {
    let hang = Step::get("Hang", "/hang").build().unwrap();
    let never = Step::get("Never", "/never").build().unwrap();
    let scenario = Scenario::new("hang", [hang, never]);
    let start = tokio::time::Instant::now();
    let report = Simulation::new("grace", Protocol::new("http://booker.test"))
        .population(scenario, InjectionProfile::ramp(3, Duration::from_secs(3)))
        .duration(Duration::from_secs(5))
        .grace(Duration::from_secs(2))
        .assertion(Assertion::success_rate_at_least(50.0))
        .run(BlackHole)
        .await
        .unwrap();

    let elapsed = start.elapsed();
    let window = Duration::from_secs(7)..Duration::from_secs(8);
    assert!(window.contains(&elapsed), "elapsed {elapsed:?}");
    assert_eq!(report.sessions.cancelled, 3);
    assert_eq!(report.total, 3);
    assert_eq!(report.failures.get(&FailureKind::Cancelled), Some(&3));
    let results = report.metrics.results();
    assert!(results.iter().all(|r| r.step == "Hang"));
    assert!(results.iter().all(|r| r.latency.is_none()));
    assert!(!report.passed);
}
