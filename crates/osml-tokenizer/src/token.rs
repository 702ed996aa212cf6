//! Token types shared by the tokenizer and the parser layers.

use std::fmt;

use crate::SourceLocation;

/// Opaque identifier of a token type.
///
/// Ids below [`TokenId::FIRST_USER`] are reserved; everything else is handed
/// out by [`Tokenizer::register_token`](crate::Tokenizer::register_token).
/// The default is [`TokenId::EMPTY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TokenId(pub u32);

impl TokenId {
    /// No token.
    pub const EMPTY: TokenId = TokenId(0);
    /// A run of text that did not match any registered token.
    pub const TEXT: TokenId = TokenId(1);
    /// A single linebreak.
    pub const NEWLINE: TokenId = TokenId(2);
    /// A paragraph break (blank line).
    pub const PARAGRAPH: TokenId = TokenId(3);
    /// A section break.
    pub const SECTION: TokenId = TokenId(4);
    /// Increase of the indentation level.
    pub const INDENT: TokenId = TokenId(5);
    /// Decrease of the indentation level.
    pub const DEDENT: TokenId = TokenId(6);
    /// The first id handed out for registered tokens.
    pub const FIRST_USER: TokenId = TokenId(7);

    /// Whether this is the `EMPTY` id.
    #[inline]
    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }

    /// Whether this id was handed out by a tokenizer.
    #[inline]
    pub fn is_user(self) -> bool {
        self >= Self::FIRST_USER
    }

    /// Whether this is one of the reserved special ids.
    #[inline]
    pub fn is_special(self) -> bool {
        !self.is_empty() && !self.is_user()
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TokenId::EMPTY => f.write_str("EMPTY"),
            TokenId::TEXT => f.write_str("TEXT"),
            TokenId::NEWLINE => f.write_str("NEWLINE"),
            TokenId::PARAGRAPH => f.write_str("PARAGRAPH"),
            TokenId::SECTION => f.write_str("SECTION"),
            TokenId::INDENT => f.write_str("INDENT"),
            TokenId::DEDENT => f.write_str("DEDENT"),
            TokenId(id) => write!(f, "T{id}"),
        }
    }
}

/// How whitespace is treated while aggregating a text token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhitespaceMode {
    /// Every byte is kept verbatim.
    Preserve,
    /// Leading and trailing whitespace is removed.
    Trim,
    /// Like `Trim`, and every internal run of whitespace becomes one space.
    #[default]
    Collapse,
}

/// A matched token or a run of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The token type, [`TokenId::TEXT`] for text runs.
    pub id: TokenId,
    /// The registered token string or the (whitespace-reduced) text.
    pub content: String,
    /// Where the token was found.
    pub location: SourceLocation,
}

impl Token {
    /// Create a new token.
    pub fn new(id: TokenId, content: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            id,
            content: content.into(),
            location,
        }
    }

    /// Whether this token is a run of text.
    #[inline]
    pub fn is_text(&self) -> bool {
        self.id == TokenId::TEXT
    }
}
