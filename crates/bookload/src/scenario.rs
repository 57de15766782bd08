//! Steps and scenarios.
//!
//! A [`Scenario`] is a name plus an ordered, immutable list of [`Step`]s.
//! Templates and field paths are parsed when a step is built, so a scenario
//! that builds successfully cannot fail on syntax at run time; only missing
//! session variables can.

use crate::check::Check;
use crate::error::BookloadResult;
use crate::http::{join_url, HttpMethod};
use crate::template::Template;
use std::sync::Arc;

/// One request template plus its checks
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    name: String,
    method: HttpMethod,
    path: Template,
    headers: Vec<(String, Template)>,
    body: Option<Template>,
    checks: Vec<Check>,
    feed: bool,
}

impl Step {
    /// Start building a step
    pub fn builder(
        name: impl Into<String>,
        method: HttpMethod,
        path: impl Into<String>,
    ) -> StepBuilder {
        StepBuilder {
            name: name.into(),
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
            checks: Vec::new(),
            feed: false,
        }
    }

    /// GET step
    pub fn get(name: impl Into<String>, path: impl Into<String>) -> StepBuilder {
        Self::builder(name, HttpMethod::Get, path)
    }

    /// POST step
    pub fn post(name: impl Into<String>, path: impl Into<String>) -> StepBuilder {
        Self::builder(name, HttpMethod::Post, path)
    }

    /// PUT step
    pub fn put(name: impl Into<String>, path: impl Into<String>) -> StepBuilder {
        Self::builder(name, HttpMethod::Put, path)
    }

    /// DELETE step
    pub fn delete(name: impl Into<String>, path: impl Into<String>) -> StepBuilder {
        Self::builder(name, HttpMethod::Delete, path)
    }

    /// Step name, used to group results
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request method
    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Path template
    #[must_use]
    pub fn path(&self) -> &Template {
        &self.path
    }

    /// Header templates
    #[must_use]
    pub fn headers(&self) -> &[(String, Template)] {
        &self.headers
    }

    /// Body template
    #[must_use]
    pub fn body(&self) -> Option<&Template> {
        self.body.as_ref()
    }

    /// Checks, in evaluation order
    #[must_use]
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Whether a feeder record is drawn before this step renders
    #[must_use]
    pub fn feeds(&self) -> bool {
        self.feed
    }

    /// Every session variable this step's templates reference
    pub fn referenced_variables(&self) -> impl Iterator<Item = &str> {
        self.path
            .placeholders()
            .chain(self.headers.iter().flat_map(|(_, t)| t.placeholders()))
            .chain(self.body.iter().flat_map(Template::placeholders))
    }
}

/// Builder for [`Step`]
#[derive(Debug, Clone)]
pub struct StepBuilder {
    name: String,
    method: HttpMethod,
    path: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
    checks: Vec<Check>,
    feed: bool,
}

impl StepBuilder {
    /// Add a header; the value may contain placeholders
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body; it may contain placeholders
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add a check
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Add a check that may have failed to parse
    pub fn try_check(mut self, check: BookloadResult<Check>) -> BookloadResult<Self> {
        self.checks.push(check?);
        Ok(self)
    }

    /// Draw one feeder record into the session before rendering
    pub fn feed(mut self) -> Self {
        self.feed = true;
        self
    }

    /// Parse every template and produce the step
    pub fn build(self) -> BookloadResult<Step> {
        let headers = self
            .headers
            .into_iter()
            .map(|(name, value)| Template::parse(&value).map(|t| (name, t)))
            .collect::<BookloadResult<Vec<_>>>()?;
        Ok(Step {
            name: self.name,
            method: self.method,
            path: Template::parse(&self.path)?,
            headers,
            body: self.body.as_deref().map(Template::parse).transpose()?,
            checks: self.checks,
            feed: self.feed,
        })
    }
}

/// Named, ordered sequence of steps
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    name: String,
    steps: Arc<[Step]>,
}

impl Scenario {
    /// Create a scenario from already built steps
    pub fn new(name: impl Into<String>, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            name: name.into(),
            steps: steps.into_iter().collect(),
        }
    }

    /// Scenario name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps in execution order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the scenario has no steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Settings shared by every request of a simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    base_url: String,
    headers: Vec<(String, String)>,
}

impl Protocol {
    /// Protocol rooted at `base_url` with no default headers
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: Vec::new(),
        }
    }

    /// Add a default header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// `Accept: application/json`
    pub fn accept_json(self) -> Self {
        self.header("Accept", "application/json")
    }

    /// `Content-Type: application/json`
    pub fn content_type_json(self) -> Self {
        self.header("Content-Type", "application/json")
    }

    /// Service root
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Default headers
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Absolute URL for a rendered path
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Defaults merged with step headers; a step header replaces every
    /// default of the same name
    #[must_use]
    pub fn merge_headers(&self, step_headers: Vec<(String, String)>) -> Vec<(String, String)> {
        let mut merged: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(name, _)| !step_headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)))
            .cloned()
            .collect();
        merged.extend(step_headers);
        merged
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_step() {
        let step = Step::put("UpdateBooking", "/booking/#{bookingId}")
            .header("Cookie", "token=#{token}")
            .body(r##"{"firstname":"#{firstname}"}"##)
            .check(Check::status_in([200, 201, 202]))
            .feed()
            .build()
            .unwrap();
        assert_eq!(step.name(), "UpdateBooking");
        assert_eq!(step.method(), HttpMethod::Put);
        assert!(step.feeds());
        assert_eq!(step.checks().len(), 1);
        let vars: Vec<_> = step.referenced_variables().collect();
        assert_eq!(vars, vec!["bookingId", "token", "firstname"]);
    }

    #[test]
    fn test_build_rejects_bad_template() {
        let step = Step::get("Broken", "/booking/#{bookingId");
        let err = step.build().unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn test_try_check_propagates_parse_error() {
        let read = Step::get("Read", "/booking/1");
        assert!(read.try_check(Check::field_exists("$..x")).is_err());
    }

    #[test]
    fn test_scenario_preserves_order() {
        let steps = ["A", "B", "C"]
            .into_iter()
            .map(|n| Step::get(n, "/").build().unwrap());
        let scenario = Scenario::new("ordered", steps);
        let names: Vec<_> = scenario.steps().iter().map(Step::name).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(scenario.len(), 3);
    }

    #[test]
    fn test_protocol_merge_headers() {
        let protocol = Protocol::new("http://localhost:3001")
            .accept_json()
            .content_type_json();
        let accept = vec![("accept".to_string(), "text/plain".to_string())];
        let merged = protocol.merge_headers(accept);
        let view: Vec<_> = merged
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let expected = [
            ("Content-Type", "application/json"),
            ("accept", "text/plain"),
        ];
        assert_eq!(view, expected);
        assert_eq!(protocol.url("/ping"), "http://localhost:3001/ping");
    }
}
