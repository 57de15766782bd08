//! Response checks: status codes, JSON field presence and equality, and
//! extraction of response values into the session.
//!
//! Checks never raise. A failing check produces a [`CheckResult`] with
//! `passed == false` and the step carries on to its next check.

use crate::error::{BookloadError, BookloadResult};
use crate::http::HttpResponse;
use crate::session::{Session, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One hop in a field path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSegment {
    /// Object member
    Key(String),
    /// Array element
    Index(usize),
}

/// A parsed JSON field path such as `$.bookingdates.checkin` or `$.items[0].id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPath {
    source: String,
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Parse a path. The leading `$` is optional; `$` alone is the root.
    pub fn parse(source: &str) -> BookloadResult<Self> {
        let trimmed = source.trim();
        let body = match trimmed.strip_prefix('$') {
            Some(rest) => rest.to_string(),
            // Bare `firstname` is shorthand for `$.firstname`.
            None if !trimmed.is_empty() && !trimmed.starts_with(['.', '[']) => {
                format!(".{trimmed}")
            }
            None => trimmed.to_string(),
        };
        let mut segments = Vec::new();
        let mut chars = body.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    let mut key = String::new();
                    while let Some(&next) = chars.peek() {
                        if next == '.' || next == '[' {
                            break;
                        }
                        key.push(next);
                        chars.next();
                    }
                    if key.is_empty() {
                        return Err(BookloadError::invalid_field_path(source, "empty key"));
                    }
                    segments.push(PathSegment::Key(key));
                }
                '[' => {
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) => digits.push(d),
                            None => {
                                return Err(BookloadError::invalid_field_path(
                                    source,
                                    "unterminated index",
                                ))
                            }
                        }
                    }
                    let index = digits.trim().parse::<usize>().map_err(|_| {
                        BookloadError::invalid_field_path(
                            source,
                            format!("index {digits:?} is not a non-negative integer"),
                        )
                    })?;
                    segments.push(PathSegment::Index(index));
                }
                other => {
                    return Err(BookloadError::invalid_field_path(
                        source,
                        format!("unexpected character {other:?}"),
                    ))
                }
            }
        }

        Ok(Self {
            source: trimmed.to_string(),
            segments,
        })
    }

    /// Parsed segments
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Resolve against a JSON document
    #[must_use]
    pub fn resolve<'a>(&self, root: &'a serde_json::Value) -> Option<&'a serde_json::Value> {
        self.segments
            .iter()
            .try_fold(root, |node, segment| match segment {
                PathSegment::Key(key) => node.get(key.as_str()),
                PathSegment::Index(i) => node.get(*i),
            })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A single response check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Check {
    /// Status code is one of the listed codes
    StatusIn {
        /// Acceptable codes
        codes: Vec<u16>,
    },
    /// Field exists in the JSON body
    FieldExists {
        /// Field to look up
        path: FieldPath,
    },
    /// Field exists and equals a value
    FieldEquals {
        /// Field to look up
        path: FieldPath,
        /// Expected value
        expected: Value,
    },
    /// Field exists; its value is saved into a session variable
    Save {
        /// Field to look up
        path: FieldPath,
        /// Session variable to write
        variable: String,
    },
}

impl Check {
    /// Status must equal `code`
    #[must_use]
    pub fn status(code: u16) -> Self {
        Self::StatusIn { codes: vec![code] }
    }

    /// Status must be one of `codes`
    #[must_use]
    pub fn status_in(codes: impl IntoIterator<Item = u16>) -> Self {
        Self::StatusIn {
            codes: codes.into_iter().collect(),
        }
    }

    /// Field at `path` must exist
    pub fn field_exists(path: &str) -> BookloadResult<Self> {
        Ok(Self::FieldExists {
            path: FieldPath::parse(path)?,
        })
    }

    /// Field at `path` must equal `expected`
    pub fn field_equals(path: &str, expected: impl Into<Value>) -> BookloadResult<Self> {
        Ok(Self::FieldEquals {
            path: FieldPath::parse(path)?,
            expected: expected.into(),
        })
    }

    /// Field at `path` is saved as `variable`
    pub fn save(path: &str, variable: impl Into<String>) -> BookloadResult<Self> {
        Ok(Self::Save {
            path: FieldPath::parse(path)?,
            variable: variable.into(),
        })
    }

    /// Short human-readable description
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::StatusIn { codes } => match codes.as_slice() {
                [code] => format!("status == {code}"),
                _ => format!("status in {codes:?}"),
            },
            Self::FieldExists { path } => format!("{path} exists"),
            Self::FieldEquals { path, expected } => format!("{path} == {expected}"),
            Self::Save { path, variable } => format!("{path} saved as {variable}"),
        }
    }

    /// Evaluate against a response, writing extractions into `session`
    pub fn evaluate(&self, response: &ParsedResponse<'_>, session: &mut Session) -> CheckResult {
        match self {
            Self::StatusIn { codes } => {
                let status = response.status();
                if codes.contains(&status) {
                    CheckResult::pass(self)
                } else {
                    CheckResult::fail(self, format!("got status {status}"))
                }
            }
            Self::FieldExists { path } => match response.field(path) {
                Ok(_) => CheckResult::pass(self),
                Err(detail) => CheckResult::fail(self, detail),
            },
            Self::FieldEquals { path, expected } => match response.field(path) {
                Ok(found) if expected.matches_json(found) => CheckResult::pass(self),
                Ok(found) => CheckResult::fail(self, format!("found {found}")),
                Err(detail) => CheckResult::fail(self, detail),
            },
            Self::Save { path, variable } => match response.field(path) {
                Ok(found) => {
                    session.set(variable.clone(), Value::from_json(found));
                    CheckResult::pass(self)
                }
                Err(detail) => CheckResult::fail(self, detail),
            },
        }
    }
}

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Check description
    pub check: String,
    /// Whether it passed
    pub passed: bool,
    /// Failure detail
    pub detail: Option<String>,
}

impl CheckResult {
    fn pass(check: &Check) -> Self {
        Self {
            check: check.description(),
            passed: true,
            detail: None,
        }
    }

    fn fail(check: &Check, detail: impl Into<String>) -> Self {
        Self {
            check: check.description(),
            passed: false,
            detail: Some(detail.into()),
        }
    }
}

/// A response whose body is parsed as JSON at most once
#[derive(Debug)]
pub struct ParsedResponse<'a> {
    response: &'a HttpResponse,
    json: std::cell::OnceCell<Result<serde_json::Value, String>>,
}

impl<'a> ParsedResponse<'a> {
    /// Wrap a response
    #[must_use]
    pub fn new(response: &'a HttpResponse) -> Self {
        Self {
            response,
            json: std::cell::OnceCell::new(),
        }
    }

    /// Status code
    #[must_use]
    pub fn status(&self) -> u16 {
        self.response.status
    }

    fn json(&self) -> Result<&serde_json::Value, String> {
        self.json
            .get_or_init(|| {
                serde_json::from_str(&self.response.body)
                    .map_err(|e| format!("body is not JSON: {e}"))
            })
            .as_ref()
            .map_err(String::clone)
    }

    fn field(&self, path: &FieldPath) -> Result<&serde_json::Value, String> {
        let root = self.json()?;
        path.resolve(root)
            .ok_or_else(|| format!("{path} not found"))
    }
}
