//! Longest-match tokenizer over a [`SourceReader`].

use tracing::{debug, trace};

use crate::{
    SourceLocation, SourceOffset, SourceReader, Token, TokenId, TokenTrie, TrieNode,
    WhitespaceHandler, WhitespaceMode,
};

/// A trie walk that started at some byte of the input.
#[derive(Clone, Copy)]
struct Lookup<'t> {
    node: &'t TrieNode,
    start: SourceOffset,
    /// Length of the committed text when the walk started.
    text_len: usize,
    /// End of the committed text when the walk started.
    text_end: SourceOffset,
}

/// A completed lookup.
#[derive(Debug, Clone, Copy)]
struct Match {
    id: TokenId,
    start: SourceOffset,
    end: SourceOffset,
    text_len: usize,
    text_end: SourceOffset,
}

impl Match {
    fn len(&self) -> SourceOffset {
        self.end - self.start
    }
}

/// Splits the input into registered tokens and runs of text.
///
/// Registered tokens are recognized anywhere in the input, also in the middle
/// of a word. When several tokens overlap the longest one wins, and among
/// equally long tokens the one that starts first. Text preceding a match is
/// returned first; the match itself follows with the next call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokenizer {
    trie: TokenTrie,
    /// Registered strings, indexed by `id - FIRST_USER`.
    tokens: Vec<Option<String>>,
    whitespace: WhitespaceMode,
}

impl Tokenizer {
    /// Create a tokenizer without any registered token.
    pub fn new(whitespace: WhitespaceMode) -> Self {
        Self {
            whitespace,
            ..Self::default()
        }
    }

    /// The whitespace mode applied to text tokens.
    #[inline]
    pub fn whitespace_mode(&self) -> WhitespaceMode {
        self.whitespace
    }

    /// Change the whitespace mode for subsequent text tokens.
    pub fn set_whitespace_mode(&mut self, mode: WhitespaceMode) {
        self.whitespace = mode;
    }

    /// Register `token` under the smallest free id.
    ///
    /// Returns `TokenId::EMPTY` if `token` is empty or already registered.
    pub fn register_token(&mut self, token: &str) -> TokenId {
        let slot = self
            .tokens
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.tokens.len());
        let id = TokenId(TokenId::FIRST_USER.0 + slot as u32);
        if !self.trie.register(token.as_bytes(), id) {
            return TokenId::EMPTY;
        }
        if slot == self.tokens.len() {
            self.tokens.push(Some(token.to_string()));
        } else {
            self.tokens[slot] = Some(token.to_string());
        }
        debug!("registered token {:?} as {}", token, id);
        id
    }

    /// Remove the token registered under `id`.
    pub fn unregister_token(&mut self, id: TokenId) -> bool {
        let Some(slot) = id.0.checked_sub(TokenId::FIRST_USER.0) else {
            return false;
        };
        let Some(token) = self.tokens.get_mut(slot as usize).and_then(Option::take) else {
            return false;
        };
        while matches!(self.tokens.last(), Some(None)) {
            self.tokens.pop();
        }
        debug!("unregistered token {:?} ({})", token, id);
        self.trie.unregister(token.as_bytes())
    }

    /// The string registered under `id`.
    pub fn token_string(&self, id: TokenId) -> Option<&str> {
        let slot = id.0.checked_sub(TokenId::FIRST_USER.0)?;
        self.tokens.get(slot as usize)?.as_deref()
    }

    /// The id registered for exactly `token`, `EMPTY` if there is none.
    pub fn token_id(&self, token: &str) -> TokenId {
        self.trie.has(token.as_bytes())
    }

    /// The underlying trie.
    #[inline]
    pub fn trie(&self) -> &TokenTrie {
        &self.trie
    }

    /// Read the next token at the read cursor and consume it.
    ///
    /// Returns `None` at the end of the input, and also when a pushed input
    /// that is still open ends before the token is complete; in the latter
    /// case nothing is consumed and the call can be repeated after `feed`.
    pub fn read(&self, reader: &mut SourceReader) -> Option<Token> {
        reader.reset_peek();
        let token = self.scan(reader);
        reader.commit_peek();
        if let Some(token) = &token {
            trace!("token {} {:?} at {}", token.id, token.content, token.location);
        }
        token
    }

    /// Read the next token at the peek cursor, leaving the peek cursor at its
    /// end. Successive calls return successive tokens until
    /// [`SourceReader::reset_peek`] is called.
    pub fn peek(&self, reader: &mut SourceReader) -> Option<Token> {
        self.scan(reader)
    }

    /// Scan one token starting at the peek cursor and leave the peek cursor
    /// at its end.
    fn scan(&self, reader: &mut SourceReader) -> Option<Token> {
        let source = reader.source_id();
        let scan_start = reader.peek_offset();
        let mut text = WhitespaceHandler::new(self.whitespace);
        let mut lookups: Vec<Lookup<'_>> = Vec::new();
        let mut matched: Option<Match> = None;

        let reached_end = loop {
            let char_start = reader.peek_offset();
            let Some(c) = reader.peek() else {
                break true;
            };
            let char_end = reader.peek_offset();

            // Once something matched, only walks already under way may
            // still produce a longer match.
            if matched.is_none() {
                lookups.push(Lookup {
                    node: self.trie.root(),
                    start: char_start,
                    text_len: text.len(),
                    text_end: text.end(),
                });
            }

            let mut alive = Vec::with_capacity(lookups.len());
            for lookup in lookups.drain(..) {
                let Some(node) = lookup.node.child(c) else {
                    continue;
                };
                if !node.id().is_empty() {
                    let candidate = Match {
                        id: node.id(),
                        start: lookup.start,
                        end: char_end,
                        text_len: lookup.text_len,
                        text_end: lookup.text_end,
                    };
                    if matched.is_none_or(|m| candidate.len() > m.len()) {
                        matched = Some(candidate);
                    }
                }
                if node.has_children() {
                    alive.push(Lookup { node, ..lookup });
                }
            }
            lookups = alive;

            if matched.is_none() {
                text.append(c, char_start, char_end, false);
            } else if lookups.is_empty() {
                break false;
            }
        };

        if reached_end && !reader.is_exhausted() {
            // More input may still extend the text or a lookup.
            reposition(reader, scan_start);
            return None;
        }

        let (token, end) = match matched {
            Some(m) if m.text_len > 0 => {
                text.truncate(m.text_len, m.text_end);
                let (content, location) = text.take(source)?;
                (Token::new(TokenId::TEXT, content, location), m.start)
            }
            Some(m) => {
                let content = self.token_string(m.id).unwrap_or_default();
                let location = SourceLocation::new(source, m.start, m.end);
                (Token::new(m.id, content, location), m.end)
            }
            None => {
                let end = reader.peek_offset();
                let (content, location) = text.take(source)?;
                (Token::new(TokenId::TEXT, content, location), end)
            }
        };
        reposition(reader, end);
        Some(token)
    }
}

/// Put the peek cursor at the absolute offset `offset`.
fn reposition(reader: &mut SourceReader, offset: SourceOffset) {
    reader.reset_peek();
    reader.seek_peek(offset);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceId;

    fn tokenize(tokenizer: &Tokenizer, input: &str) -> Vec<(TokenId, String, u32, u32)> {
        let mut reader = SourceReader::from_bytes(SourceId(0), input.as_bytes().to_vec());
        std::iter::from_fn(|| tokenizer.read(&mut reader))
            .map(|t| (t.id, t.content, t.location.start, t.location.end))
            .collect()
    }

    fn text(content: &str, start: u32, end: u32) -> (TokenId, String, u32, u32) {
        (TokenId::TEXT, content.to_string(), start, end)
    }

    #[test]
    fn test_text_only() {
        let tokenizer = Tokenizer::new(WhitespaceMode::Collapse);
        assert_eq!(
            tokenize(&tokenizer, " hello \t world "),
            vec![text("hello world", 1, 14)]
        );
    }

    #[test]
    fn test_whitespace_only_input() {
        let tokenizer = Tokenizer::new(WhitespaceMode::Trim);
        assert_eq!(tokenize(&tokenizer, "  \n "), vec![]);
        let tokenizer = Tokenizer::new(WhitespaceMode::Preserve);
        assert_eq!(tokenize(&tokenizer, "  "), vec![text("  ", 0, 2)]);
    }

    #[test]
    fn test_text_before_token() {
        let mut tokenizer = Tokenizer::new(WhitespaceMode::Preserve);
        let brace = tokenizer.register_token("{");
        assert_eq!(
            tokenize(&tokenizer, "ab{c"),
            vec![
                text("ab", 0, 2),
                (brace, "{".to_string(), 2, 3),
                text("c", 3, 4)
            ]
        );
    }

    #[test]
    fn test_longest_match() {
        let mut tokenizer = Tokenizer::new(WhitespaceMode::Preserve);
        let open = tokenizer.register_token("{");
        let open_default = tokenizer.register_token("{!");
        assert_eq!(
            tokenize(&tokenizer, "{!{x"),
            vec![
                (open_default, "{!".to_string(), 0, 2),
                (open, "{".to_string(), 2, 3),
                text("x", 3, 4)
            ]
        );
    }

    #[test]
    fn test_partial_lookup_falls_back_to_text() {
        let mut tokenizer = Tokenizer::new(WhitespaceMode::Preserve);
        let comment = tokenizer.register_token("%{");
        assert_eq!(
            tokenize(&tokenizer, "a%b%{"),
            vec![text("a%b", 0, 3), (comment, "%{".to_string(), 3, 5)]
        );
    }

    #[test]
    fn test_overlapping_tokens_prefer_longer() {
        let mut tokenizer = Tokenizer::new(WhitespaceMode::Preserve);
        let ab = tokenizer.register_token("ab");
        let bcd = tokenizer.register_token("bcd");
        assert_eq!(
            tokenize(&tokenizer, "abcd"),
            vec![text("a", 0, 1), (bcd, "bcd".to_string(), 1, 4)]
        );
        assert_eq!(
            tokenize(&tokenizer, "abc"),
            vec![(ab, "ab".to_string(), 0, 2), text("c", 2, 3)]
        );
    }

    #[test]
    fn test_equal_length_prefers_earlier_start() {
        let mut tokenizer = Tokenizer::new(WhitespaceMode::Preserve);
        let ab = tokenizer.register_token("ab");
        tokenizer.register_token("bc");
        assert_eq!(
            tokenize(&tokenizer, "abc"),
            vec![(ab, "ab".to_string(), 0, 2), text("c", 2, 3)]
        );
    }

    #[test]
    fn test_token_at_end_of_input() {
        let mut tokenizer = Tokenizer::new(WhitespaceMode::Collapse);
        let end = tokenizer.register_token("\\>");
        assert_eq!(
            tokenize(&tokenizer, " f \\>"),
            vec![text("f", 1, 2), (end, "\\>".to_string(), 3, 5)]
        );
    }

    #[test]
    fn test_trim_drops_whitespace_around_tokens() {
        let mut tokenizer = Tokenizer::new(WhitespaceMode::Trim);
        let brace = tokenizer.register_token("{");
        assert_eq!(
            tokenize(&tokenizer, " a  b { c "),
            vec![
                text("a  b", 1, 5),
                (brace, "{".to_string(), 6, 7),
                text("c", 8, 9)
            ]
        );
    }

    #[test]
    fn test_register_reuses_smallest_free_id() {
        let mut tokenizer = Tokenizer::default();
        let a = tokenizer.register_token("a");
        let b = tokenizer.register_token("b");
        assert_eq!(a, TokenId::FIRST_USER);
        assert_eq!(b, TokenId(TokenId::FIRST_USER.0 + 1));
        assert_eq!(tokenizer.register_token("a"), TokenId::EMPTY);
        assert_eq!(tokenizer.register_token(""), TokenId::EMPTY);
        assert!(tokenizer.unregister_token(a));
        assert!(!tokenizer.unregister_token(a));
        assert_eq!(tokenizer.register_token("c"), a);
        assert_eq!(tokenizer.token_string(a), Some("c"));
        assert_eq!(tokenizer.token_id("b"), b);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut tokenizer = Tokenizer::new(WhitespaceMode::Preserve);
        let brace = tokenizer.register_token("}");
        let mut reader = SourceReader::from_bytes(SourceId(0), b"x}y".to_vec());
        assert_eq!(tokenizer.peek(&mut reader).map(|t| t.content), Some("x".into()));
        assert_eq!(tokenizer.peek(&mut reader).map(|t| t.id), Some(brace));
        assert_eq!(reader.offset(), 0);
        reader.reset_peek();
        assert_eq!(tokenizer.read(&mut reader).map(|t| t.content), Some("x".into()));
        assert_eq!(reader.offset(), 1);
        assert_eq!(tokenizer.read(&mut reader).map(|t| t.id), Some(brace));
        assert_eq!(tokenizer.read(&mut reader).map(|t| t.content), Some("y".into()));
        assert_eq!(tokenizer.read(&mut reader), None);
    }

    #[test]
    fn test_waiting_for_input() {
        let mut tokenizer = Tokenizer::new(WhitespaceMode::Preserve);
        let open = tokenizer.register_token("{!");
        let mut reader = SourceReader::new(SourceId(0));
        reader.feed(b"ab{");
        // Neither the text nor the lookup for `{!` can be finished yet
        assert_eq!(tokenizer.read(&mut reader), None);
        assert_eq!(reader.offset(), 0);
        reader.feed(b"!");
        reader.close();
        assert_eq!(tokenizer.read(&mut reader).map(|t| t.content), Some("ab".into()));
        assert_eq!(tokenizer.read(&mut reader).map(|t| t.id), Some(open));
        assert_eq!(tokenizer.read(&mut reader), None);
        assert!(reader.at_end());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::{SourceId, is_whitespace};
    use proptest::prelude::*;

    /// The syntax tokens of OSML, which overlap in interesting ways.
    const SYNTAX: &[&str] = &["\\", "{", "}", "{!", "<\\", "\\>", "%", "%{", "}%"];

    fn syntax_tokenizer(mode: WhitespaceMode) -> Tokenizer {
        let mut tokenizer = Tokenizer::new(mode);
        for token in SYNTAX {
            tokenizer.register_token(token);
        }
        tokenizer
    }

    /// Inputs built from syntax characters, words and whitespace.
    fn input() -> impl Strategy<Value = String> {
        prop::string::string_regex(r"[ab{}!%<>\\ \t\n]{0,40}").unwrap()
    }

    fn tokens(tokenizer: &Tokenizer, input: &str) -> Vec<Token> {
        let mut reader = SourceReader::from_bytes(SourceId(0), input.as_bytes().to_vec());
        std::iter::from_fn(|| tokenizer.read(&mut reader)).collect()
    }

    fn non_whitespace(s: &str) -> String {
        s.bytes()
            .filter(|c| !is_whitespace(*c))
            .map(char::from)
            .collect()
    }

    proptest! {
        /// In preserve mode the tokens are a gapless partition of the input
        #[test]
        fn preserve_reproduces_input(input in input()) {
            let tokens = tokens(&syntax_tokenizer(WhitespaceMode::Preserve), &input);
            let joined: String = tokens.iter().map(|t| t.content.as_str()).collect();
            prop_assert_eq!(&joined, &input);

            let mut offset = 0;
            for token in &tokens {
                prop_assert_eq!(token.location.start, offset);
                offset = token.location.end;
            }
            prop_assert_eq!(offset as usize, input.len());
        }

        /// Reducing whitespace never loses or invents anything else
        #[test]
        fn reduced_modes_keep_everything_but_whitespace(
            input in input(),
            mode in prop_oneof![Just(WhitespaceMode::Trim), Just(WhitespaceMode::Collapse)],
        ) {
            let tokens = tokens(&syntax_tokenizer(mode), &input);
            let joined: String = tokens.iter().map(|t| t.content.as_str()).collect();
            prop_assert_eq!(non_whitespace(&joined), non_whitespace(&input));

            for token in tokens.iter().filter(|t| t.is_text()) {
                let bytes = token.content.as_bytes();
                prop_assert!(!bytes.is_empty());
                prop_assert!(!is_whitespace(bytes[0]));
                prop_assert!(!is_whitespace(bytes[bytes.len() - 1]));
                if mode == WhitespaceMode::Collapse {
                    prop_assert!(!token.content.contains("  "));
                    prop_assert!(bytes.iter().all(|c| *c == b' ' || !is_whitespace(*c)));
                }
            }
        }

        /// Registering and unregistering a token is not observable
        #[test]
        fn register_then_unregister_is_identity(
            token in prop::string::string_regex(r"[ab{}!%\\]{1,4}").unwrap(),
            removed in 0..SYNTAX.len(),
        ) {
            let mut tokenizer = syntax_tokenizer(WhitespaceMode::Preserve);
            // Leave a hole in the id space so reuse is exercised too
            let hole = tokenizer.token_id(SYNTAX[removed]);
            tokenizer.unregister_token(hole);

            let before = tokenizer.clone();
            let id = tokenizer.register_token(&token);
            if id.is_empty() {
                prop_assert_eq!(&tokenizer, &before);
            } else {
                prop_assert!(tokenizer.unregister_token(id));
                prop_assert_eq!(&tokenizer, &before);
            }
        }
    }
}
