//! Non-fatal diagnostics and their rendering.

use std::fmt;

use ariadne::{Color, Label, Report, ReportKind, Source};
use osml_tokenizer::SourceLocation;

use crate::{Error, ErrorKind};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// A message attached to a source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub message: String,
    pub location: SourceLocation,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        kind: ErrorKind,
        message: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            location,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(Severity::Error, kind, message, location)
    }

    pub fn warning(kind: ErrorKind, message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(Severity::Warning, kind, message, location)
    }

    /// Render this diagnostic with ariadne.
    ///
    /// Returns a string containing the formatted message with source context.
    pub fn render(&self, filename: &str, source: &str) -> String {
        let mut output = Vec::new();
        self.write_report(filename, source, &mut output);
        String::from_utf8(output).unwrap_or_else(|_| format!("{}", self))
    }

    /// Write the report to a writer.
    pub fn write_report<W: std::io::Write>(&self, filename: &str, source: &str, writer: W) {
        let range = if self.location.is_valid() {
            let end = (self.location.end as usize).min(source.len());
            (self.location.start as usize).min(end)..end
        } else {
            0..0
        };
        let (kind, color) = match self.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
            Severity::Note => (ReportKind::Advice, Color::Blue),
        };
        let mut report = Report::build(kind, (filename, range.clone()))
            .with_code(self.kind.name())
            .with_message(&self.message)
            .with_label(
                Label::new((filename, range))
                    .with_message(label_for(self.kind))
                    .with_color(color),
            );
        if let Some(help) = help_for(self.kind) {
            report = report.with_help(help);
        }
        let _ = report
            .finish()
            .write((filename, Source::from(source)), writer);
    }
}

fn label_for(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Io => "while reading here",
        ErrorKind::Encoding => "malformed input",
        ErrorKind::InvalidIdentifier => "invalid identifier",
        ErrorKind::InvalidCommand => "command not allowed here",
        ErrorKind::AnnotationMismatch => "annotation end",
        ErrorKind::FieldAfterDefault => "extra field",
        ErrorKind::UnexpectedEnd => "still open at end of input",
        ErrorKind::ArgumentValidation => "arguments",
        ErrorKind::IncludeAmbiguous | ErrorKind::IncludeFailed => "include",
        ErrorKind::UnbalancedField => "unbalanced brace",
        ErrorKind::UnexpectedData => "data",
        ErrorKind::Handler => "rejected here",
    }
}

fn help_for(kind: ErrorKind) -> Option<&'static str> {
    match kind {
        ErrorKind::InvalidIdentifier => {
            Some("identifiers start with a letter or '_' and continue with letters, digits, '_' or '-'")
        }
        ErrorKind::FieldAfterDefault => Some("the default field `{!...}` must be the last field"),
        ErrorKind::UnbalancedField => Some("escape literal braces as `\\{` and `\\}`"),
        ErrorKind::AnnotationMismatch => {
            Some("annotations end with `\\name>` in the same field they started in")
        }
        _ => None,
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_valid() {
            write!(
                f,
                "{}[{}] at {}: {}",
                self.severity, self.kind, self.location, self.message
            )
        } else {
            write!(f, "{}[{}]: {}", self.severity, self.kind, self.message)
        }
    }
}

impl From<Error> for Diagnostic {
    fn from(err: Error) -> Self {
        Diagnostic::error(err.kind, err.message, err.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osml_tokenizer::SourceId;

    fn strip(rendered: String) -> String {
        String::from_utf8(strip_ansi_escapes::strip(rendered)).unwrap()
    }

    #[test]
    fn test_display() {
        let diagnostic = Diagnostic::error(
            ErrorKind::UnbalancedField,
            "unmatched '}'",
            SourceLocation::new(SourceId(0), 4, 5),
        );
        assert_eq!(
            diagnostic.to_string(),
            "error[unbalanced-field] at #0[4,5): unmatched '}'"
        );
    }

    #[test]
    fn test_render_mentions_message_and_help() {
        let source = "\\a{!x}{y}";
        let diagnostic = Diagnostic::error(
            ErrorKind::FieldAfterDefault,
            "command \"a\" has no field after its default field",
            SourceLocation::new(SourceId(0), 6, 7),
        );
        let rendered = strip(diagnostic.render("test.osml", source));
        assert!(rendered.contains("field-after-default"), "{rendered}");
        assert!(rendered.contains("has no field after its default field"), "{rendered}");
        assert!(rendered.contains("test.osml"), "{rendered}");
        assert!(rendered.contains("must be the last field"), "{rendered}");
    }

    #[test]
    fn test_render_without_location() {
        let diagnostic = Diagnostic::warning(ErrorKind::Handler, "odd", SourceLocation::invalid());
        let rendered = strip(diagnostic.render("test.osml", "abc"));
        assert!(rendered.contains("odd"), "{rendered}");
    }
}
