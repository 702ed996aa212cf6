//! Error kinds and the fatal parser error.

use std::fmt;
use std::io;

use osml_tokenizer::{SourceLocation, TokenizerError};

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input could not be read.
    Io,
    /// A malformed token, such as one spanning lines where it must not.
    Encoding,
    /// A command, annotation or element name is not a valid identifier.
    InvalidIdentifier,
    /// A command has no transition from the current state.
    InvalidCommand,
    /// An annotation end has no matching annotation start.
    AnnotationMismatch,
    /// A field was started after the default field of a command.
    FieldAfterDefault,
    /// The input ended inside an open field or range.
    UnexpectedEnd,
    /// Arguments do not match the state's argument descriptors.
    ArgumentValidation,
    /// The state of an include could not be determined unambiguously.
    IncludeAmbiguous,
    /// A field brace has no matching counterpart.
    UnbalancedField,
    /// Data appeared where no handler accepts it.
    UnexpectedData,
    /// An included source could not be resolved or would recurse.
    IncludeFailed,
    /// A handler rejected its input.
    Handler,
}

impl ErrorKind {
    /// Whether this kind ends the parse.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::Io | ErrorKind::Encoding | ErrorKind::IncludeAmbiguous
        )
    }

    /// Stable, machine readable name.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Io => "io",
            ErrorKind::Encoding => "encoding",
            ErrorKind::InvalidIdentifier => "invalid-identifier",
            ErrorKind::InvalidCommand => "invalid-command",
            ErrorKind::AnnotationMismatch => "annotation-mismatch",
            ErrorKind::FieldAfterDefault => "field-after-default",
            ErrorKind::UnexpectedEnd => "unexpected-end",
            ErrorKind::ArgumentValidation => "argument-validation",
            ErrorKind::IncludeAmbiguous => "include-ambiguous",
            ErrorKind::UnbalancedField => "unbalanced-field",
            ErrorKind::UnexpectedData => "unexpected-data",
            ErrorKind::IncludeFailed => "include-failed",
            ErrorKind::Handler => "handler",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An error that terminates the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub location: SourceLocation,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
        }
    }

    /// Wrap an I/O failure of the source with id `location.source`.
    pub fn io(err: &io::Error, location: SourceLocation) -> Self {
        Self::new(ErrorKind::Io, format!("failed to read input: {err}"), location)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_valid() {
            write!(f, "{} at {}: {}", self.kind, self.location, self.message)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for Error {}

impl From<TokenizerError> for Error {
    fn from(err: TokenizerError) -> Self {
        Error::new(ErrorKind::Encoding, err.to_string(), err.location())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osml_tokenizer::SourceId;

    #[test]
    fn test_display() {
        let err = Error::new(
            ErrorKind::IncludeAmbiguous,
            "2 states match",
            SourceLocation::new(SourceId(1), 3, 9),
        );
        assert_eq!(err.to_string(), "include-ambiguous at #1[3,9): 2 states match");
        assert!(err.kind.is_fatal());
        assert!(!ErrorKind::InvalidCommand.is_fatal());
    }

    #[test]
    fn test_from_tokenizer_error() {
        let location = SourceLocation::new(SourceId(0), 1, 4);
        let err = Error::from(TokenizerError::Multiline { location });
        assert_eq!(err.kind, ErrorKind::Encoding);
        assert_eq!(err.location, location);
    }
}
