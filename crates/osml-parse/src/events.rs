//! Event types emitted by the OSML parsers.

use std::fmt;

use osml_tokenizer::{SourceLocation, TokenId};

use crate::Map;
use crate::value::write_map;

/// Events emitted by [`OsmlStreamParser`](crate::OsmlStreamParser) and
/// [`OsmlParser`](crate::OsmlParser).
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    /// A command `\name`, or `\begin{name}` when `range` is set.
    CommandStart {
        name: String,
        args: Map,
        range: bool,
        /// Span of the command name including the backslash.
        location: SourceLocation,
    },
    /// An annotation start `<\name`.
    AnnotationStart {
        name: String,
        args: Map,
        range: bool,
        location: SourceLocation,
    },
    /// An annotation end `\name>` or `\>`.
    ///
    /// The element name given with `#name` is stored under the key `name`.
    AnnotationEnd {
        name: String,
        args: Map,
        location: SourceLocation,
    },
    /// Start of a field `{`, or of the default field `{!`.
    FieldStart {
        is_default: bool,
        location: SourceLocation,
    },
    /// End of the innermost field.
    FieldEnd { location: SourceLocation },
    /// A run of text, after whitespace handling.
    Data {
        content: String,
        location: SourceLocation,
    },
    /// A user token opened an element.
    TokenStart { id: TokenId, location: SourceLocation },
    /// A user token closed an element.
    TokenEnd { id: TokenId, location: SourceLocation },
    /// End of input.
    End { location: SourceLocation },
}

impl ParseEvent {
    pub fn location(&self) -> SourceLocation {
        match self {
            ParseEvent::CommandStart { location, .. }
            | ParseEvent::AnnotationStart { location, .. }
            | ParseEvent::AnnotationEnd { location, .. }
            | ParseEvent::FieldStart { location, .. }
            | ParseEvent::FieldEnd { location }
            | ParseEvent::Data { location, .. }
            | ParseEvent::TokenStart { location, .. }
            | ParseEvent::TokenEnd { location, .. }
            | ParseEvent::End { location } => *location,
        }
    }

    /// Whether this is the final [`ParseEvent::End`].
    pub fn is_end(&self) -> bool {
        matches!(self, ParseEvent::End { .. })
    }
}

impl fmt::Display for ParseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseEvent::CommandStart {
                name,
                args,
                range,
                location,
            } => {
                write!(f, "CommandStart {name} ")?;
                write_map(f, args)?;
                if *range {
                    write!(f, " range")?;
                }
                write!(f, " {location}")
            }
            ParseEvent::AnnotationStart {
                name,
                args,
                range,
                location,
            } => {
                write!(f, "AnnotationStart {name} ")?;
                write_map(f, args)?;
                if *range {
                    write!(f, " range")?;
                }
                write!(f, " {location}")
            }
            ParseEvent::AnnotationEnd {
                name,
                args,
                location,
            } => {
                write!(f, "AnnotationEnd {name:?} ")?;
                write_map(f, args)?;
                write!(f, " {location}")
            }
            ParseEvent::FieldStart {
                is_default: true,
                location,
            } => write!(f, "FieldStart default {location}"),
            ParseEvent::FieldStart { location, .. } => write!(f, "FieldStart {location}"),
            ParseEvent::FieldEnd { location } => write!(f, "FieldEnd {location}"),
            ParseEvent::Data { content, location } => write!(f, "Data {content:?} {location}"),
            ParseEvent::TokenStart { id, location } => write!(f, "TokenStart {id} {location}"),
            ParseEvent::TokenEnd { id, location } => write!(f, "TokenEnd {id} {location}"),
            ParseEvent::End { location } => write!(f, "End {location}"),
        }
    }
}

/// One event per line, for logs and snapshots.
pub fn dump_events(events: &[ParseEvent]) -> String {
    let mut out = String::new();
    for event in events {
        out.push_str(&event.to_string());
        out.push('\n');
    }
    out
}
