//! Strings and comments on top of a [`Tokenizer`].

use std::collections::{HashMap, VecDeque};

use tracing::trace;

use crate::{
    SourceLocation, SourceReader, Token, TokenId, Tokenizer, TokenizerError, WhitespaceMode,
};

/// The role a registered token plays for the [`CodeTokenFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodeTokenMode {
    /// An ordinary token, passed through.
    #[default]
    None,
    /// Opens and closes a string literal.
    StringStartEnd,
    /// Starts a comment running to the end of the line.
    LineComment,
    /// Opens a block comment.
    BlockCommentStart,
    /// Closes a block comment.
    BlockCommentEnd,
    /// A linebreak.
    Linebreak,
    /// Escapes the next token inside a string.
    Escape,
}

/// How a registered token is treated and which id it is reported with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenDescriptor {
    pub mode: CodeTokenMode,
    /// The id of the token emitted for this token (or for the string or
    /// comment it opens).
    pub id: TokenId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InString,
    InLineComment,
    InBlockComment,
}

/// Turns the raw token stream of a [`Tokenizer`] into words, strings and
/// comments.
///
/// The inner tokenizer preserves whitespace; text outside strings and
/// comments is split into words here. A linebreak token (`"\n"`, reported as
/// [`TokenId::NEWLINE`]) is always registered, so no other token ever spans a
/// line boundary; one that does anyway is reported as
/// [`TokenizerError::Multiline`].
#[derive(Debug, Clone)]
pub struct CodeTokenFilter {
    tokenizer: Tokenizer,
    descriptors: HashMap<TokenId, TokenDescriptor>,
    /// Drop comments instead of emitting them.
    pub ignore_comments: bool,
    /// Drop linebreaks instead of emitting them.
    pub ignore_linebreaks: bool,
    state: State,
    escaped: bool,
    buffer: String,
    /// Location of the string or comment being aggregated.
    location: SourceLocation,
    /// Id the aggregated string or comment is emitted with.
    emit_id: TokenId,
    pending: VecDeque<Token>,
    peek_cursor: usize,
}

impl Default for CodeTokenFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeTokenFilter {
    /// Create a filter with only the linebreak token registered.
    pub fn new() -> Self {
        let mut filter = Self {
            tokenizer: Tokenizer::new(WhitespaceMode::Preserve),
            descriptors: HashMap::new(),
            ignore_comments: false,
            ignore_linebreaks: false,
            state: State::Normal,
            escaped: false,
            buffer: String::new(),
            location: SourceLocation::invalid(),
            emit_id: TokenId::EMPTY,
            pending: VecDeque::new(),
            peek_cursor: 0,
        };
        filter.add("\n", CodeTokenMode::Linebreak, TokenId::NEWLINE);
        filter
    }

    /// Register `token` with the given role.
    ///
    /// `id` is the id reported for the token (or for the string or comment
    /// it opens); `EMPTY` reports the id assigned by the tokenizer. Returns
    /// the tokenizer id, or `EMPTY` if `token` could not be registered.
    pub fn add(&mut self, token: &str, mode: CodeTokenMode, id: TokenId) -> TokenId {
        let raw = self.tokenizer.register_token(token);
        if raw.is_empty() {
            return TokenId::EMPTY;
        }
        let id = if id.is_empty() { raw } else { id };
        self.descriptors.insert(raw, TokenDescriptor { mode, id });
        raw
    }

    /// The descriptor of the token registered under `id`.
    pub fn descriptor(&self, id: TokenId) -> Option<TokenDescriptor> {
        self.descriptors.get(&id).copied()
    }

    /// The inner tokenizer.
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Read and consume the next token.
    pub fn read(&mut self, reader: &mut SourceReader) -> Result<Option<Token>, TokenizerError> {
        self.peek_cursor = 0;
        if self.pending.is_empty() && !self.fill(reader)? {
            return Ok(None);
        }
        Ok(self.pending.pop_front())
    }

    /// Return the token after the last peeked one without consuming anything.
    pub fn peek(&mut self, reader: &mut SourceReader) -> Result<Option<Token>, TokenizerError> {
        while self.pending.len() <= self.peek_cursor {
            if !self.fill(reader)? {
                return Ok(None);
            }
        }
        let token = self.pending.get(self.peek_cursor).cloned();
        self.peek_cursor += 1;
        Ok(token)
    }

    /// Restart peeking at the next unread token.
    pub fn reset_peek(&mut self) {
        self.peek_cursor = 0;
    }

    /// Consume every token returned by `peek` since the last read.
    pub fn consume_peek(&mut self) {
        let n = self.peek_cursor.min(self.pending.len());
        self.pending.drain(..n);
        self.peek_cursor = 0;
    }

    /// Feed inner tokens through the state machine until at least one token
    /// is pending. Returns `false` if the input ran out first.
    fn fill(&mut self, reader: &mut SourceReader) -> Result<bool, TokenizerError> {
        let before = self.pending.len();
        while self.pending.len() == before {
            match self.tokenizer.read(reader) {
                Some(token) => self.process(token)?,
                None => {
                    if reader.is_exhausted() {
                        self.finish();
                    }
                    return Ok(self.pending.len() > before);
                }
            }
        }
        Ok(true)
    }

    fn process(&mut self, token: Token) -> Result<(), TokenizerError> {
        let descriptor = self.descriptor(token.id).unwrap_or(TokenDescriptor {
            mode: CodeTokenMode::None,
            id: token.id,
        });
        if descriptor.mode != CodeTokenMode::Linebreak && token.content.contains('\n') {
            return Err(TokenizerError::Multiline {
                location: token.location,
            });
        }

        match (self.state, descriptor.mode) {
            (State::Normal, CodeTokenMode::StringStartEnd) => {
                self.open(State::InString, descriptor.id, token.location);
            }
            (State::Normal, CodeTokenMode::BlockCommentStart) => {
                self.open(State::InBlockComment, descriptor.id, token.location);
            }
            (State::Normal, CodeTokenMode::LineComment) => {
                self.open(State::InLineComment, descriptor.id, token.location);
            }
            (State::Normal, CodeTokenMode::Linebreak) => self.linebreak(descriptor.id, token),
            (State::Normal, _) if token.is_text() => self.split_words(&token),
            (State::Normal, _) => self.emit(Token {
                id: descriptor.id,
                ..token
            }),

            (State::InString, CodeTokenMode::Escape) => {
                if self.escaped {
                    self.buffer.push_str(&token.content);
                }
                self.escaped = !self.escaped;
                self.location = self.location.extend(token.location);
            }
            (State::InString, CodeTokenMode::StringStartEnd) if !self.escaped => {
                self.location = self.location.extend(token.location);
                self.close(true);
            }
            (State::InString, _) => {
                self.buffer.push_str(&token.content);
                self.escaped = false;
                self.location = self.location.extend(token.location);
            }

            (State::InLineComment, CodeTokenMode::Linebreak) => {
                self.close(!self.ignore_comments);
                self.linebreak(TokenId::NEWLINE, token);
            }
            (State::InBlockComment, CodeTokenMode::BlockCommentEnd) => {
                self.location = self.location.extend(token.location);
                self.close(!self.ignore_comments);
            }
            (State::InLineComment | State::InBlockComment, _) => {
                if !self.ignore_comments {
                    self.buffer.push_str(&token.content);
                }
                self.location = self.location.extend(token.location);
            }
        }
        Ok(())
    }

    fn open(&mut self, state: State, id: TokenId, location: SourceLocation) {
        self.state = state;
        self.emit_id = id;
        self.location = location;
        self.escaped = false;
        self.buffer.clear();
    }

    /// Leave the current string or comment, emitting it if asked to.
    fn close(&mut self, emit: bool) {
        let content = std::mem::take(&mut self.buffer);
        if emit {
            self.emit(Token::new(self.emit_id, content, self.location));
        }
        self.state = State::Normal;
        self.escaped = false;
    }

    /// Flush an unterminated string or comment at the end of the input.
    fn finish(&mut self) {
        match self.state {
            State::Normal => {}
            State::InString => self.close(true),
            State::InLineComment | State::InBlockComment => self.close(!self.ignore_comments),
        }
    }

    fn linebreak(&mut self, id: TokenId, token: Token) {
        if !self.ignore_linebreaks {
            self.emit(Token { id, ..token });
        }
    }

    fn split_words(&mut self, token: &Token) {
        let start = token.location.start;
        let mut word_start = None;
        for (i, c) in token.content.bytes().enumerate().chain([(token.content.len(), b' ')]) {
            match (c == b' ' || c == b'\t', word_start) {
                (false, None) => word_start = Some(i),
                (true, Some(from)) => {
                    let location = SourceLocation::new(
                        token.location.source,
                        start + from as u32,
                        start + i as u32,
                    );
                    self.emit(Token::new(TokenId::TEXT, &token.content[from..i], location));
                    word_start = None;
                }
                _ => {}
            }
        }
    }

    fn emit(&mut self, token: Token) {
        trace!("code token {} {:?} at {}", token.id, token.content, token.location);
        self.pending.push_back(token);
    }
}
