//! Virtual-user sessions.
//!
//! A [`Session`] is one virtual user's private state for a single scenario
//! run: a typed variable map fed by feeder draws and check extractions, plus
//! the ordered log of steps it has completed. Sessions are never shared
//! between tasks, so nothing here is synchronized.

use crate::error::InterpolationError;
use crate::feeder::FeederRecord;
use crate::metrics::FailureKind;
use crate::template::Template;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A session variable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Signed integer
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Calendar date, rendered as `YYYY-MM-DD`
    Date(NaiveDate),
    /// Text
    String(String),
}

impl Value {
    /// Convert an extracted JSON value.
    ///
    /// Scalars map onto their typed variant. `null`, arrays and objects are
    /// kept as their compact JSON text.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Integer),
            serde_json::Value::String(s) => Self::String(s.clone()),
            other => Self::String(other.to_string()),
        }
    }

    /// Whether this value equals a JSON value, comparing by rendered form
    /// for mismatched types (so `Integer(1)` equals `"1"`)
    #[must_use]
    pub fn matches_json(&self, json: &serde_json::Value) -> bool {
        let other = Self::from_json(json);
        *self == other || self.to_string() == other.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// One entry in a session's step log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLogEntry {
    /// Step name
    pub step: String,
    /// Whether the step succeeded
    pub success: bool,
    /// Why it failed, if it did
    pub failure: Option<FailureKind>,
}

/// One virtual user's state for a single scenario run
#[derive(Debug, Clone)]
pub struct Session {
    id: u64,
    scenario: String,
    vars: HashMap<String, Value>,
    log: Vec<StepLogEntry>,
}

impl Session {
    /// Create an empty session
    pub fn new(id: u64, scenario: impl Into<String>) -> Self {
        Self {
            id,
            scenario: scenario.into(),
            vars: HashMap::new(),
            log: Vec::new(),
        }
    }

    /// Session identifier, unique within a run
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the scenario this session executes
    #[must_use]
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// Set a variable, returning the value it replaced
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.vars.insert(name.into(), value.into())
    }

    /// Read a variable
    pub fn get(&self, name: &str) -> Result<&Value, InterpolationError> {
        self.vars
            .get(name)
            .ok_or_else(|| InterpolationError::missing(name))
    }

    /// Whether a variable is set
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Number of variables set
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether no variable is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Copy every field of a feeder record into the variables
    pub fn feed(&mut self, record: FeederRecord) {
        for (name, value) in record {
            self.vars.insert(name, value);
        }
    }

    /// Render a template against the current variables
    pub fn render(&self, template: &Template) -> Result<String, InterpolationError> {
        template
            .render_with(|name| self.vars.get(name).map(ToString::to_string))
            .map_err(InterpolationError::missing)
    }

    /// Append to the step log
    pub fn record(&mut self, entry: StepLogEntry) {
        self.log.push(entry);
    }

    /// Completed steps, in execution order
    #[must_use]
    pub fn log(&self) -> &[StepLogEntry] {
        &self.log
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut session = Session::new(1, "CRUD Happy Path");
        assert!(session.set("token", "abc123").is_none());
        assert_eq!(session.get("token").unwrap(), &Value::from("abc123"));
        assert_eq!(session.scenario(), "CRUD Happy Path");
    }

    #[test]
    fn test_last_write_wins() {
        let mut session = Session::new(1, "s");
        session.set("bookingId", 1_i64);
        let old = session.set("bookingId", 2_i64);
        assert_eq!(old, Some(Value::Integer(1)));
        assert_eq!(session.get("bookingId").unwrap(), &Value::Integer(2));
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_get_missing() {
        let session = Session::new(1, "s");
        let err = session.get("token").unwrap_err();
        assert_eq!(err.name, "token");
    }

    #[test]
    fn test_render() {
        let mut session = Session::new(1, "s");
        session.set("bookingId", 42_i64);
        session.set("depositpaid", true);
        let t = Template::parse("/booking/#{bookingId}?paid=#{depositpaid}").unwrap();
        assert_eq!(session.render(&t).unwrap(), "/booking/42?paid=true");
    }

    #[test]
    fn test_render_missing_variable() {
        let session = Session::new(1, "s");
        let t = Template::parse("token=#{token}").unwrap();
        assert_eq!(
            session.render(&t).unwrap_err(),
            InterpolationError::missing("token")
        );
    }

    #[test]
    fn test_feed_overwrites() {
        let mut session = Session::new(1, "s");
        session.set("firstname", "Old");
        let record = FeederRecord::new()
            .with("firstname", "User1")
            .with("checkin", NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
        session.feed(record);
        assert_eq!(session.get("firstname").unwrap().to_string(), "User1");
        assert_eq!(session.get("checkin").unwrap().to_string(), "2026-01-02");
    }

    #[test]
    fn test_value_from_json() {
        assert_eq!(Value::from_json(&serde_json::json!(7)), Value::Integer(7));
        assert_eq!(Value::from_json(&serde_json::json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from_json(&serde_json::json!("x")), Value::from("x"));
        let no = Value::from_json(&serde_json::json!(false));
        assert_eq!(no, Value::Bool(false));
        assert_eq!(
            Value::from_json(&serde_json::json!({"a": 1})).to_string(),
            r#"{"a":1}"#
        );
        let null = Value::from_json(&serde_json::Value::Null);
        assert_eq!(null.to_string(), "null");
    }

    #[test]
    fn test_matches_json_across_types() {
        assert!(Value::Integer(1).matches_json(&serde_json::json!("1")));
        assert!(Value::from("Jim").matches_json(&serde_json::json!("Jim")));
        assert!(!Value::Bool(true).matches_json(&serde_json::json!(false)));
    }

    #[test]
    fn test_log_preserves_order() {
        let mut session = Session::new(1, "s");
        for name in ["CreateToken", "CreateBooking"] {
            session.record(StepLogEntry {
                step: name.to_string(),
                success: true,
                failure: None,
            });
        }
        let names: Vec<_> = session.log().iter().map(|e| e.step.as_str()).collect();
        assert_eq!(names, vec!["CreateToken", "CreateBooking"]);
    }
}
