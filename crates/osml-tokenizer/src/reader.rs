//! Buffered byte reader with linebreak normalization and restartable peeking.

use std::collections::VecDeque;
use std::io::{self, Read};

use tracing::{trace, warn};

use crate::{SourceId, SourceLocation, SourceOffset};

/// Number of bytes pulled from a backing stream at once.
const CHUNK_SIZE: usize = 4096;

/// Marker bits in the high nibble of the linebreak state.
const LB_LF: u8 = 0x10;
const LB_CR: u8 = 0x20;

/// Position of one cursor within the buffered input.
#[derive(Debug, Clone, Copy)]
struct ReadCursor {
    /// Line of the next byte, starting at 1.
    line: u32,
    /// Column of the next byte, starting at 1.
    column: u32,
    /// Absolute offset of the next raw byte.
    pos: SourceOffset,
    /// Linebreak substitution state, see [`substitute_linebreak`].
    lb_state: u8,
    /// Whether advancing this cursor releases the bytes behind it.
    destructive: bool,
}

impl ReadCursor {
    fn new(destructive: bool) -> Self {
        Self {
            line: 1,
            column: 1,
            pos: 0,
            lb_state: 0,
            destructive,
        }
    }

    /// Copy the position of `other` while keeping our own destructiveness.
    fn assign(&mut self, other: &ReadCursor) {
        self.line = other.line;
        self.column = other.column;
        self.pos = other.pos;
        self.lb_state = other.lb_state;
    }

    fn advance_position(&mut self, c: u8) {
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if c & 0xC0 != 0x80 {
            // UTF-8 continuation bytes do not start a new column
            self.column += 1;
        }
    }
}

/// Collapses `\n`, `\r`, `\n\r` and `\r\n` into a single `\n`.
///
/// The low nibble of `state` holds the parity of the current run of
/// linebreak bytes, the high nibble holds which byte was seen last. Returns
/// `None` when the byte is the second half of a cross-type pair.
fn substitute_linebreak(state: &mut u8, c: u8) -> Option<u8> {
    let ty = match c {
        b'\n' => LB_LF,
        b'\r' => LB_CR,
        _ => {
            *state = 0;
            return Some(c);
        }
    };
    let last_ty = *state & 0xF0;
    let last_count = *state & 0x0F;
    *state = ((last_count + 1) & 1) | ty;
    if last_count == 0 || last_ty == ty {
        Some(b'\n')
    } else {
        None
    }
}

enum Input {
    /// Bytes are pushed with `feed` until `close` is called.
    Pushed { closed: bool },
    /// Bytes are pulled from a backing stream on demand.
    Stream {
        inner: Box<dyn Read>,
        depleted: bool,
    },
}

/// A byte reader with a destructive read cursor and a non-destructive peek
/// cursor.
///
/// Both cursors deliver the same logical byte sequence: linebreaks are
/// normalized to `\n` no matter where buffer boundaries fall, and lines and
/// columns are tracked for each cursor separately. The peek cursor is never
/// behind the read cursor.
pub struct SourceReader {
    source: SourceId,
    buffer: VecDeque<u8>,
    /// Absolute offset of `buffer[0]`.
    base: SourceOffset,
    input: Input,
    error: Option<io::Error>,
    read: ReadCursor,
    peek: ReadCursor,
}

impl SourceReader {
    /// Create an empty reader that receives its bytes through [`feed`](Self::feed).
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            buffer: VecDeque::new(),
            base: 0,
            input: Input::Pushed { closed: false },
            error: None,
            read: ReadCursor::new(true),
            peek: ReadCursor::new(false),
        }
    }

    /// Create a closed reader over a complete input.
    pub fn from_bytes(source: SourceId, bytes: impl Into<Vec<u8>>) -> Self {
        let mut reader = Self::new(source);
        reader.buffer = VecDeque::from(bytes.into());
        reader.input = Input::Pushed { closed: true };
        reader
    }

    /// Create a reader that pulls its bytes from `inner` as they are needed.
    pub fn from_read(source: SourceId, inner: impl Read + 'static) -> Self {
        let mut reader = Self::new(source);
        reader.input = Input::Stream {
            inner: Box::new(inner),
            depleted: false,
        };
        reader
    }

    /// The source this reader delivers.
    #[inline]
    pub fn source_id(&self) -> SourceId {
        self.source
    }

    /// Append bytes to the input.
    ///
    /// Returns `false` (and keeps the input unchanged) after [`close`](Self::close)
    /// or when the reader is backed by a stream.
    pub fn feed(&mut self, bytes: &[u8]) -> bool {
        match self.input {
            Input::Pushed { closed: false } => {
                self.buffer.extend(bytes);
                true
            }
            Input::Pushed { closed: true } => {
                warn!("feed after close ignored ({} bytes)", bytes.len());
                false
            }
            Input::Stream { .. } => {
                warn!("feed on a stream-backed reader ignored");
                false
            }
        }
    }

    /// Mark the end of the pushed input.
    pub fn close(&mut self) {
        if let Input::Pushed { closed } = &mut self.input {
            *closed = true;
        }
    }

    /// Whether no more bytes can arrive beyond what is buffered.
    pub fn is_exhausted(&self) -> bool {
        match self.input {
            Input::Pushed { closed } => closed,
            Input::Stream { depleted, .. } => depleted,
        }
    }

    /// Take the error the backing stream failed with, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    /// Pull another chunk from the backing stream. Returns whether the
    /// buffer grew.
    fn fill(&mut self) -> bool {
        let Input::Stream { inner, depleted } = &mut self.input else {
            return false;
        };
        if *depleted {
            return false;
        }
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            match inner.read(&mut chunk) {
                Ok(0) => {
                    *depleted = true;
                    return false;
                }
                Ok(n) => {
                    self.buffer.extend(&chunk[..n]);
                    return true;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("reading source {} failed: {}", self.source, e);
                    *depleted = true;
                    self.error = Some(e);
                    return false;
                }
            }
        }
    }

    /// The raw byte at absolute offset `pos`.
    fn raw_at(&mut self, pos: SourceOffset) -> Option<u8> {
        let idx = (pos - self.base) as usize;
        while idx >= self.buffer.len() {
            if !self.fill() {
                return None;
            }
        }
        self.buffer.get(idx).copied()
    }

    /// Advance `cursor` by one logical byte.
    fn advance(&mut self, cursor: &mut ReadCursor) -> Option<u8> {
        loop {
            let raw = self.raw_at(cursor.pos)?;
            cursor.pos += 1;
            if let Some(c) = substitute_linebreak(&mut cursor.lb_state, raw) {
                cursor.advance_position(c);
                return Some(c);
            }
        }
    }

    /// Drop every byte before the read cursor.
    fn release(&mut self) {
        debug_assert!(self.read.destructive);
        let n = (self.read.pos - self.base) as usize;
        if n > 0 {
            self.buffer.drain(..n.min(self.buffer.len()));
            self.base = self.read.pos;
        }
    }

    /// Read the next logical byte and move the peek cursor along.
    pub fn read(&mut self) -> Option<u8> {
        let mut cursor = self.read;
        let c = self.advance(&mut cursor);
        self.read = cursor;
        self.peek.assign(&self.read);
        self.release();
        c
    }

    /// Peek at the next logical byte without moving the read cursor.
    pub fn peek(&mut self) -> Option<u8> {
        let mut cursor = self.peek;
        let c = self.advance(&mut cursor);
        self.peek = cursor;
        c
    }

    /// Move the read cursor to the peek cursor.
    pub fn commit_peek(&mut self) {
        self.read.assign(&self.peek);
        self.release();
    }

    /// Move the peek cursor back to the read cursor.
    pub fn reset_peek(&mut self) {
        self.peek.assign(&self.read);
    }

    /// Advance the peek cursor until it reaches the absolute offset `offset`.
    ///
    /// Returns `false` if the input ended before.
    pub fn seek_peek(&mut self, offset: SourceOffset) -> bool {
        while self.peek.pos < offset {
            if self.peek().is_none() {
                return false;
            }
        }
        true
    }

    /// Skip ASCII whitespace at the read cursor.
    pub fn consume_whitespace(&mut self) {
        self.reset_peek();
        while let Some(c) = self.peek() {
            if !c.is_ascii_whitespace() {
                break;
            }
            self.commit_peek();
        }
        self.reset_peek();
    }

    /// Whether the read cursor reached the end of a complete input.
    pub fn at_end(&mut self) -> bool {
        let mut cursor = self.read;
        self.advance(&mut cursor).is_none() && self.is_exhausted()
    }

    /// Whether the read cursor caught up with a pushed input that is still
    /// open, so a `None` from `read` is not final.
    pub fn is_waiting(&mut self) -> bool {
        let mut cursor = self.read;
        self.advance(&mut cursor).is_none() && !self.is_exhausted()
    }

    /// Line of the read cursor.
    #[inline]
    pub fn line(&self) -> u32 {
        self.read.line
    }

    /// Column of the read cursor.
    #[inline]
    pub fn column(&self) -> u32 {
        self.read.column
    }

    /// Line of the peek cursor.
    #[inline]
    pub fn peek_line(&self) -> u32 {
        self.peek.line
    }

    /// Absolute offset of the read cursor.
    #[inline]
    pub fn offset(&self) -> SourceOffset {
        self.read.pos
    }

    /// Absolute offset of the peek cursor.
    #[inline]
    pub fn peek_offset(&self) -> SourceOffset {
        self.peek.pos
    }

    /// A location spanning from `start` to the read cursor.
    pub fn location_from(&self, start: SourceOffset) -> SourceLocation {
        SourceLocation::new(self.source, start, self.read.pos.max(start))
    }

    /// A location spanning from `start` to the peek cursor.
    pub fn peek_location_from(&self, start: SourceOffset) -> SourceLocation {
        SourceLocation::new(self.source, start, self.peek.pos.max(start))
    }
}

impl std::fmt::Debug for SourceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceReader")
            .field("source", &self.source)
            .field("buffered", &self.buffer.len())
            .field("base", &self.base)
            .field("read", &self.read)
            .field("peek", &self.peek)
            .finish()
    }
}

impl Iterator for SourceReader {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let c = self.read();
        if let Some(c) = c {
            trace!("read {:?} at {}:{}", c as char, self.read.line, self.read.column);
        }
        c
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Peeking and resetting leaves the reader where it was
        #[test]
        fn reset_peek_is_idempotent(
            input in prop::collection::vec(prop::sample::select(b"ab\r\n \xc3\xa7".to_vec()), 0..30),
            consumed in 0usize..10,
            peeked in 0usize..40,
        ) {
            let mut reader = SourceReader::from_bytes(SourceId(0), input.clone());
            for _ in 0..consumed {
                reader.read();
            }
            let before = (reader.offset(), reader.peek_offset(), reader.line(), reader.column());

            reader.reset_peek();
            for _ in 0..peeked {
                reader.peek();
            }
            reader.reset_peek();

            let after = (reader.offset(), reader.peek_offset(), reader.line(), reader.column());
            prop_assert_eq!(before, after);

            let rest: Vec<u8> = std::iter::from_fn(|| reader.read()).collect();
            let mut fresh = SourceReader::from_bytes(SourceId(0), input);
            for _ in 0..consumed {
                fresh.read();
            }
            let expected: Vec<u8> = std::iter::from_fn(|| fresh.read()).collect();
            prop_assert_eq!(rest, expected);
        }
    }
}
