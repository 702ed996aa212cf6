//! Aggregation of text runs under a [`WhitespaceMode`].

use crate::{INVALID_OFFSET, SourceId, SourceLocation, SourceOffset, WhitespaceMode};

/// Whether `c` counts as whitespace for text aggregation.
#[inline]
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C)
}

/// Collects the bytes of a text run and applies the whitespace mode.
///
/// `start`/`end` always describe the committed content only: whitespace
/// that was dropped or is still pending (trailing whitespace in `Trim` and
/// `Collapse` mode) is not part of the location.
#[derive(Debug, Clone)]
pub struct WhitespaceHandler {
    mode: WhitespaceMode,
    content: Vec<u8>,
    /// Whitespace seen after the last committed byte.
    pending: Vec<u8>,
    start: SourceOffset,
    end: SourceOffset,
}

impl WhitespaceHandler {
    /// Create an empty handler.
    pub fn new(mode: WhitespaceMode) -> Self {
        Self {
            mode,
            content: Vec::new(),
            pending: Vec::new(),
            start: INVALID_OFFSET,
            end: INVALID_OFFSET,
        }
    }

    /// The mode this handler applies.
    #[inline]
    pub fn mode(&self) -> WhitespaceMode {
        self.mode
    }

    /// Append the byte `c` found at `[start, end)`.
    ///
    /// A `protected` byte is never treated as whitespace; escaped spaces use
    /// this to survive trimming and collapsing.
    pub fn append(&mut self, c: u8, start: SourceOffset, end: SourceOffset, protected: bool) {
        if self.mode != WhitespaceMode::Preserve && !protected && is_whitespace(c) {
            if !self.content.is_empty() {
                self.pending.push(c);
            }
            return;
        }
        if !self.pending.is_empty() {
            match self.mode {
                WhitespaceMode::Collapse => self.content.push(b' '),
                _ => self.content.extend_from_slice(&self.pending),
            }
            self.pending.clear();
        }
        if self.content.is_empty() {
            self.start = start;
        }
        self.content.push(c);
        self.end = end;
    }

    /// Append every byte of `text`, which was found at `[start, end)`.
    ///
    /// Byte `i` is assumed to sit at `start + i`; the last byte ends at `end`.
    pub fn append_str(&mut self, text: &[u8], start: SourceOffset, end: SourceOffset) {
        let last = text.len().saturating_sub(1);
        for (i, &c) in text.iter().enumerate() {
            let c_start = (start + i as SourceOffset).min(end);
            let c_end = if i == last {
                end
            } else {
                (c_start + 1).min(end)
            };
            self.append(c, c_start, c_end, false);
        }
    }

    /// Whether any content was committed.
    #[inline]
    pub fn has_text(&self) -> bool {
        !self.content.is_empty()
    }

    /// Length of the committed content.
    #[inline]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether nothing was committed yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Start offset of the committed content.
    #[inline]
    pub fn start(&self) -> SourceOffset {
        self.start
    }

    /// End offset of the committed content.
    #[inline]
    pub fn end(&self) -> SourceOffset {
        self.end
    }

    /// Cut the committed content back to `len` bytes ending at `end`.
    pub fn truncate(&mut self, len: usize, end: SourceOffset) {
        self.content.truncate(len);
        self.pending.clear();
        if self.content.is_empty() {
            self.start = INVALID_OFFSET;
            self.end = INVALID_OFFSET;
        } else {
            self.end = end;
        }
    }

    /// Take the committed bytes and their location, leaving the handler empty.
    pub fn take_bytes(&mut self, source: SourceId) -> Option<(Vec<u8>, SourceLocation)> {
        self.pending.clear();
        if self.content.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut self.content);
        let location = SourceLocation::new(source, self.start, self.end);
        self.start = INVALID_OFFSET;
        self.end = INVALID_OFFSET;
        Some((bytes, location))
    }

    /// Like [`take_bytes`](Self::take_bytes), decoding lossily as UTF-8.
    pub fn take(&mut self, source: SourceId) -> Option<(String, SourceLocation)> {
        let (bytes, location) = self.take_bytes(source)?;
        let text = String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
        Some((text, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(mode: WhitespaceMode, input: &str) -> Option<(String, u32, u32)> {
        let mut handler = WhitespaceHandler::new(mode);
        handler.append_str(input.as_bytes(), 0, input.len() as u32);
        handler
            .take(SourceId(0))
            .map(|(text, loc)| (text, loc.start, loc.end))
    }

    #[test]
    fn test_preserve() {
        assert_eq!(
            run(WhitespaceMode::Preserve, " a \t b "),
            Some((" a \t b ".to_string(), 0, 7))
        );
    }

    #[test]
    fn test_trim() {
        assert_eq!(
            run(WhitespaceMode::Trim, " a \t b "),
            Some(("a \t b".to_string(), 1, 6))
        );
    }

    #[test]
    fn test_collapse() {
        assert_eq!(
            run(WhitespaceMode::Collapse, " hello \t world "),
            Some(("hello world".to_string(), 1, 14))
        );
    }

    #[test]
    fn test_whitespace_only() {
        assert_eq!(run(WhitespaceMode::Trim, " \n\t "), None);
        assert_eq!(run(WhitespaceMode::Collapse, "  "), None);
        assert_eq!(
            run(WhitespaceMode::Preserve, "  "),
            Some(("  ".to_string(), 0, 2))
        );
    }

    #[test]
    fn test_protected_whitespace() {
        let mut handler = WhitespaceHandler::new(WhitespaceMode::Collapse);
        handler.append(b' ', 0, 2, true);
        handler.append(b'a', 2, 3, false);
        handler.append(b' ', 3, 4, false);
        handler.append(b' ', 4, 5, false);
        handler.append(b'b', 5, 6, false);
        let (text, loc) = handler.take(SourceId(0)).unwrap();
        assert_eq!(text, " a b");
        assert_eq!((loc.start, loc.end), (0, 6));
    }

    #[test]
    fn test_truncate() {
        let mut handler = WhitespaceHandler::new(WhitespaceMode::Trim);
        handler.append_str(b"ab cd", 10, 15);
        handler.truncate(2, 12);
        let (text, loc) = handler.take(SourceId(1)).unwrap();
        assert_eq!(text, "ab");
        assert_eq!((loc.start, loc.end), (10, 12));
    }
}
