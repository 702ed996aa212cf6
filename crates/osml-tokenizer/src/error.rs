//! Errors raised while tokenizing.

use std::fmt;

use crate::SourceLocation;

/// A tokenizer error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizerError {
    /// A token other than a linebreak spans more than one line.
    Multiline {
        /// The offending token.
        location: SourceLocation,
    },
}

impl TokenizerError {
    /// Where the error occurred.
    pub fn location(&self) -> SourceLocation {
        match self {
            TokenizerError::Multiline { location } => *location,
        }
    }
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenizerError::Multiline { location } => {
                write!(f, "token at {location} spans more than one line")
            }
        }
    }
}

impl std::error::Error for TokenizerError {}
