//! Request templates with `#{name}` placeholders.
//!
//! A template is parsed once, when its step is built, into literal and
//! placeholder segments. Rendering only substitutes; it never re-parses.

use crate::error::{BookloadError, BookloadResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    /// Text copied verbatim
    Literal(String),
    /// Session variable substituted at render time
    Placeholder(String),
}

/// A parsed template
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template source.
    ///
    /// `#{name}` marks a placeholder. A `#` that is not followed by `{` is
    /// literal text. Names may contain ASCII letters, digits, `_`, `-` and `.`.
    pub fn parse(source: &str) -> BookloadResult<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(pos) = rest.find("#{") {
            literal.push_str(&rest[..pos]);
            let after = &rest[pos + 2..];
            let Some(end) = after.find('}') else {
                return Err(BookloadError::invalid_template(
                    source,
                    "unterminated placeholder",
                ));
            };
            let name = after[..end].trim();
            if name.is_empty() {
                return Err(BookloadError::invalid_template(source, "empty placeholder"));
            }
            if let Some(bad) = name.chars().find(|c| !is_name_char(*c)) {
                return Err(BookloadError::invalid_template(
                    source,
                    format!("invalid character {bad:?} in placeholder {name:?}"),
                ));
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Placeholder(name.to_string()));
            rest = &after[end + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Template that renders to `text` with no substitution
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        let segments = if text.is_empty() {
            Vec::new()
        } else {
            vec![Segment::Literal(text.clone())]
        };
        Self {
            source: text,
            segments,
        }
    }

    /// Source text as written
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed segments
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of every placeholder, in order of appearance
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Render with `lookup`, failing on the first unresolved placeholder.
    ///
    /// Returns the name of the unresolved placeholder on failure.
    pub fn render_with<F>(&self, mut lookup: F) -> Result<String, String>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => return Err(name.clone()),
                },
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}
