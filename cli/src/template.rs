//! Output templates for `upcoming ls --format`.
//!
//! A template is literal text with `{field}` placeholders:
//!
//! | Placeholder      | Value                                  |
//! |------------------|----------------------------------------|
//! | `{source}`       | event source                           |
//! | `{sourceId}`     | identifier within the source           |
//! | `{title}`        | title                                  |
//! | `{invokeManual}` | manual invocation hint (may be empty)  |
//! | `{when}`         | firing time, RFC 3339 in UTC           |
//! | `{humanize}`     | time left, e.g. `2h 5m`                |
//!
//! `{{` and `}}` produce literal braces. Templates are parsed once, so an
//! unknown placeholder is reported before anything is printed.

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;
use upcoming_core::Event;

/// Errors from parsing a template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A placeholder names no known field.
    #[error("unknown placeholder {{{name}}} at byte {position}")]
    UnknownPlaceholder {
        /// The placeholder name.
        name: String,
        /// Byte offset of the opening brace.
        position: usize,
    },

    /// A `{` was never closed.
    #[error("unclosed placeholder starting at byte {0}")]
    Unclosed(usize),

    /// A lone `}` appeared outside a placeholder.
    #[error("unmatched '}}' at byte {0}; write '}}}}' for a literal brace")]
    UnmatchedClose(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Source,
    SourceId,
    Title,
    InvokeManual,
    When,
    Humanize,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "source" => Some(Self::Source),
            "sourceId" => Some(Self::SourceId),
            "title" => Some(Self::Title),
            "invokeManual" => Some(Self::InvokeManual),
            "when" => Some(Self::When),
            "humanize" => Some(Self::Humanize),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// A parsed output template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template string.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] for unknown placeholders or unbalanced
    /// braces.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((position, c)) = chars.next() {
            match c {
                '{' if chars.next_if(|&(_, next)| next == '{').is_some() => literal.push('{'),
                '}' if chars.next_if(|&(_, next)| next == '}').is_some() => literal.push('}'),
                '}' => return Err(TemplateError::UnmatchedClose(position)),
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, c)) => name.push(c),
                            None => return Err(TemplateError::Unclosed(position)),
                        }
                    }
                    let field = Field::from_name(name.trim())
                        .ok_or(TemplateError::UnknownPlaceholder { name, position })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field));
                }
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// Render `event` with time-relative fields measured from `now`.
    pub fn render(&self, event: &Event, now: DateTime<Utc>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(Field::Source) => out.push_str(&event.source),
                Segment::Field(Field::SourceId) => out.push_str(&event.source_id),
                Segment::Field(Field::Title) => out.push_str(&event.title),
                Segment::Field(Field::InvokeManual) => out.push_str(&event.invoke_manual),
                Segment::Field(Field::When) => {
                    out.push_str(&event.when.to_rfc3339_opts(SecondsFormat::Secs, true));
                }
                Segment::Field(Field::Humanize) => out.push_str(&event.humanize_until(now)),
            }
        }
        out
    }
}
