//! Pull parser for the OSML surface syntax.
//!
//! [`OsmlStreamParser`] turns bytes into surface events: commands, fields,
//! annotations, data and user tokens. It only checks that braces, ranges and
//! fields are balanced; which command may appear where is decided later by
//! the [`ParserStack`](crate::ParserStack).
//!
//! Every construct is scanned on the reader's peek cursor and only committed
//! once it is complete, so a pushed input that is still open can end at any
//! byte: the parser reports that it is waiting and picks up where it left off
//! after the next [`SourceReader::feed`].

use std::collections::VecDeque;

use osml_tokenizer::{
    SourceLocation, SourceOffset, SourceReader, TokenId, Tokenizer, WhitespaceHandler,
    WhitespaceMode,
};
use tracing::{debug, trace};

use crate::{Error, ErrorKind, Logger, Map, ParseEvent, ParserOptions, Value, parse_arguments};

#[cfg(test)]
mod tests;

/// Whether `name` is a valid command or element name.
///
/// Names start with a letter or underscore and continue with letters,
/// digits, underscores and dashes. Colons separate namespaces.
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split(':').all(|part| {
            let mut bytes = part.bytes();
            bytes
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == b'_')
                && bytes.all(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'-')
        })
}

/// Ids of the tokens that make up the surface syntax.
#[derive(Debug, Clone, Copy)]
struct SyntaxTokens {
    backslash: TokenId,
    field_start: TokenId,
    default_field_start: TokenId,
    field_end: TokenId,
    annotation_start: TokenId,
    annotation_end: TokenId,
    line_comment: TokenId,
    block_comment_start: TokenId,
    block_comment_end: TokenId,
}

impl SyntaxTokens {
    fn register(tokenizer: &mut Tokenizer) -> Self {
        let mut id = |token: &str| match tokenizer.token_id(token) {
            TokenId::EMPTY => tokenizer.register_token(token),
            existing => existing,
        };
        Self {
            backslash: id("\\"),
            field_start: id("{"),
            default_field_start: id("{!"),
            field_end: id("}"),
            annotation_start: id("<\\"),
            annotation_end: id("\\>"),
            line_comment: id("%"),
            block_comment_start: id("%{"),
            block_comment_end: id("}%"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    /// The document level.
    Root,
    /// A command or annotation start.
    Command,
    /// A `\begin` whose `\end` is still missing.
    Range,
    /// Swallows the contents of a misplaced field.
    Dummy,
}

#[derive(Debug, Clone)]
struct OpenCommand {
    name: String,
    kind: EntryKind,
    in_field: bool,
    in_default_field: bool,
    had_default_field: bool,
}

impl OpenCommand {
    fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
            in_field: false,
            in_default_field: false,
            had_default_field: false,
        }
    }

    /// A command that may still get a field.
    fn is_waiting(&self) -> bool {
        self.kind == EntryKind::Command && !self.in_field
    }
}

/// Why scanning stopped early.
enum Stop {
    /// The input is still open and the construct incomplete.
    Pending,
    Fatal(Error),
}

impl From<Error> for Stop {
    fn from(err: Error) -> Self {
        Stop::Fatal(err)
    }
}

/// The next byte at the peek cursor.
fn peek_byte(reader: &mut SourceReader) -> Result<Option<u8>, Stop> {
    match reader.peek() {
        Some(c) => Ok(Some(c)),
        None if reader.is_exhausted() => Ok(None),
        None => Err(Stop::Pending),
    }
}

/// Put the peek cursor back to the absolute offset `offset`.
fn rewind(reader: &mut SourceReader, offset: SourceOffset) {
    reader.reset_peek();
    reader.seek_peek(offset);
}

/// Consume `byte` at the peek cursor if it is next.
fn next_is(reader: &mut SourceReader, byte: u8) -> Result<bool, Stop> {
    let before = reader.peek_offset();
    if peek_byte(reader)? == Some(byte) {
        return Ok(true);
    }
    rewind(reader, before);
    Ok(false)
}

/// Scan an identifier at the peek cursor.
///
/// A trailing colon is not part of the identifier and stays unread.
fn read_identifier(reader: &mut SourceReader) -> Result<Option<String>, Stop> {
    let mut ident = String::new();
    let mut len = 0;
    let mut end = reader.peek_offset();
    let mut expect_start = true;
    while let Some(c) = peek_byte(reader)? {
        if expect_start {
            if !(c.is_ascii_alphabetic() || c == b'_') {
                break;
            }
            expect_start = false;
        } else if c == b':' {
            expect_start = true;
        } else if !(c.is_ascii_alphanumeric() || c == b'_' || c == b'-') {
            break;
        }
        ident.push(char::from(c));
        if !expect_start {
            len = ident.len();
            end = reader.peek_offset();
        }
    }
    ident.truncate(len);
    rewind(reader, end);
    Ok((!ident.is_empty()).then_some(ident))
}

/// Scan `[...]` at the peek cursor and return what is between the brackets.
///
/// Nested brackets and brackets inside double-quoted strings are skipped.
/// Returns `Ok(None)` if the input ends first.
fn read_bracketed(reader: &mut SourceReader) -> Result<Option<String>, Stop> {
    let mut bytes = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    while let Some(c) = peek_byte(reader)? {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == b'\\' {
                escaped = true;
            } else if c == b'"' {
                in_string = false;
            }
        } else {
            match c {
                b'"' => in_string = true,
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Some(String::from_utf8_lossy(&bytes[1..]).into_owned()));
                    }
                }
                _ => {}
            }
        }
        bytes.push(c);
    }
    Ok(None)
}

/// Length of the UTF-8 sequence starting with `c`.
fn utf8_len(c: u8) -> usize {
    match c {
        0xF0..=0xF7 => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

/// Optional `#name` and `[args]` following a command name.
struct Suffix {
    element: Option<String>,
    /// `None` without brackets, `Some(None)` for an unterminated list.
    args: Option<Option<String>>,
}

fn read_suffix(reader: &mut SourceReader) -> Result<Suffix, Stop> {
    let element = if next_is(reader, b'#')? {
        // An empty element name is reported when the arguments are built.
        Some(read_identifier(reader)?.unwrap_or_default())
    } else {
        None
    };
    let before = reader.peek_offset();
    let args = if peek_byte(reader)? == Some(b'[') {
        rewind(reader, before);
        Some(read_bracketed(reader)?)
    } else {
        rewind(reader, before);
        None
    };
    Ok(Suffix { element, args })
}

/// Scan `{name}` or `{name#element}` after `\begin` or `\end`.
fn read_range_name(reader: &mut SourceReader) -> Result<Option<(String, Option<String>)>, Stop> {
    if !next_is(reader, b'{')? {
        return Ok(None);
    }
    let Some(name) = read_identifier(reader)? else {
        return Ok(None);
    };
    let element = if next_is(reader, b'#')? {
        match read_identifier(reader)? {
            Some(element) => Some(element),
            None => return Ok(None),
        }
    } else {
        None
    };
    if !next_is(reader, b'}')? {
        return Ok(None);
    }
    Ok(Some((name, element)))
}

/// Streams the surface events of one source.
pub struct OsmlStreamParser {
    reader: SourceReader,
    syntax: SyntaxTokens,
    data: WhitespaceHandler,
    commands: Vec<OpenCommand>,
    queue: VecDeque<ParseEvent>,
    finished: bool,
}

impl OsmlStreamParser {
    /// Create a parser reading from `reader`.
    ///
    /// The syntax tokens are registered with `tokenizer`, which is switched
    /// to [`WhitespaceMode::Preserve`]; whitespace is reduced by the parser
    /// itself according to `options`. The same tokenizer must be passed to
    /// every [`next_event`](Self::next_event) call.
    pub fn new(reader: SourceReader, tokenizer: &mut Tokenizer, options: &ParserOptions) -> Self {
        tokenizer.set_whitespace_mode(WhitespaceMode::Preserve);
        let syntax = SyntaxTokens::register(tokenizer);
        debug!(source = %reader.source_id(), "stream parser created");
        Self {
            reader,
            syntax,
            data: WhitespaceHandler::new(options.whitespace),
            commands: vec![OpenCommand::new("", EntryKind::Root)],
            queue: VecDeque::new(),
            finished: false,
        }
    }

    /// Whether the final [`ParseEvent::End`] was produced.
    pub fn is_finished(&self) -> bool {
        self.finished && self.queue.is_empty()
    }

    pub fn reader(&self) -> &SourceReader {
        &self.reader
    }

    /// The reader, for feeding more input.
    pub fn reader_mut(&mut self) -> &mut SourceReader {
        &mut self.reader
    }

    /// Produce the next event.
    ///
    /// Returns `Ok(None)` after the end, and also while a pushed input that
    /// is still open has no complete construct left; check
    /// [`is_finished`](Self::is_finished) to tell the two apart.
    pub fn next_event(
        &mut self,
        tokenizer: &Tokenizer,
        logger: &mut dyn Logger,
    ) -> Result<Option<ParseEvent>, Error> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                trace!("event {event}");
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }
            match self.step(tokenizer, logger) {
                Ok(()) => {}
                Err(Stop::Pending) => {
                    self.reader.reset_peek();
                    return Ok(None);
                }
                Err(Stop::Fatal(err)) => {
                    self.finished = true;
                    self.queue.clear();
                    return Err(err);
                }
            }
        }
    }

    /// Collect every event of a complete input.
    pub fn parse_to_vec(
        &mut self,
        tokenizer: &Tokenizer,
        logger: &mut dyn Logger,
    ) -> Result<Vec<ParseEvent>, Error> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event(tokenizer, logger)? {
            events.push(event);
        }
        Ok(events)
    }

    /// Queue `event`, unless it lies inside a misplaced field.
    fn emit(&mut self, event: ParseEvent) {
        if self.commands.iter().any(|entry| entry.kind == EntryKind::Dummy) {
            trace!("swallowed {event}");
            return;
        }
        self.queue.push_back(event);
    }

    fn location(&self, start: SourceOffset, end: SourceOffset) -> SourceLocation {
        SourceLocation::new(self.reader.source_id(), start, end)
    }

    /// Scan one construct.
    fn step(&mut self, tokenizer: &Tokenizer, logger: &mut dyn Logger) -> Result<(), Stop> {
        self.reader.reset_peek();
        let Some(token) = tokenizer.peek(&mut self.reader) else {
            if let Some(err) = self.reader.take_error() {
                let at = self.reader.offset();
                return Err(Error::io(&err, self.location(at, at)).into());
            }
            if !self.reader.is_exhausted() {
                return Err(Stop::Pending);
            }
            self.finish(logger);
            return Ok(());
        };
        let start = token.location.start;
        let location = token.location;
        let syntax = self.syntax;

        match token.id {
            TokenId::TEXT => {
                self.reader.commit_peek();
                self.data
                    .append_str(token.content.as_bytes(), location.start, location.end);
            }
            id if id == syntax.backslash => self.backslash(start, logger)?,
            id if id == syntax.annotation_start => self.annotation_start(start, logger)?,
            id if id == syntax.annotation_end => {
                self.reader.commit_peek();
                self.flush();
                self.end_overdue();
                self.emit(ParseEvent::AnnotationEnd {
                    name: String::new(),
                    args: Map::new(),
                    location,
                });
            }
            id if id == syntax.field_start || id == syntax.default_field_start => {
                self.reader.commit_peek();
                self.field_start(id == syntax.default_field_start, location, logger);
            }
            id if id == syntax.field_end => {
                self.reader.commit_peek();
                self.field_end(location, logger);
            }
            id if id == syntax.block_comment_end => {
                // Outside of a block comment this is a brace and a comment.
                self.skip_line()?;
                self.reader.commit_peek();
                let brace = self.location(start, start + 1);
                self.field_end(brace, logger);
            }
            id if id == syntax.line_comment => {
                self.skip_line()?;
                self.reader.commit_peek();
                self.flush();
            }
            id if id == syntax.block_comment_start => {
                let closed = self.skip_block_comment(tokenizer)?;
                self.reader.commit_peek();
                self.flush();
                if !closed {
                    logger.error(
                        ErrorKind::UnexpectedEnd,
                        "block comment is never closed".to_string(),
                        location,
                    );
                }
            }
            id => {
                self.reader.commit_peek();
                self.flush();
                self.end_overdue();
                self.emit(ParseEvent::TokenStart { id, location });
            }
        }
        Ok(())
    }

    /// Everything starting with a backslash: commands, ranges, annotation
    /// ends and escapes.
    fn backslash(&mut self, start: SourceOffset, logger: &mut dyn Logger) -> Result<(), Stop> {
        let Some(name) = read_identifier(&mut self.reader)? else {
            return self.escape(start, logger);
        };
        match name.as_str() {
            "begin" => self.begin(start, logger),
            "end" => self.end_range(start, logger),
            _ => self.command(name, start, logger),
        }
    }

    fn escape(&mut self, start: SourceOffset, logger: &mut dyn Logger) -> Result<(), Stop> {
        let mut bytes = Vec::new();
        let first = self.reader.peek_offset();
        if let Some(c) = peek_byte(&mut self.reader)? {
            bytes.push((c, first, self.reader.peek_offset()));
            for _ in 1..utf8_len(c) {
                let before = self.reader.peek_offset();
                match peek_byte(&mut self.reader)? {
                    Some(b) if b & 0xC0 == 0x80 => {
                        bytes.push((b, before, self.reader.peek_offset()));
                    }
                    _ => {
                        rewind(&mut self.reader, before);
                        break;
                    }
                }
            }
        }
        self.reader.commit_peek();
        if bytes.is_empty() {
            let location = self.location(start, self.reader.offset());
            logger.error(
                ErrorKind::InvalidIdentifier,
                "expected a command name or an escaped character after \\".to_string(),
                location,
            );
        }
        for (c, c_start, c_end) in bytes {
            self.data.append(c, c_start, c_end, true);
        }
        Ok(())
    }

    /// `\name`, `\name#element[args]` or the annotation end `\name>`.
    fn command(
        &mut self,
        name: String,
        start: SourceOffset,
        logger: &mut dyn Logger,
    ) -> Result<(), Stop> {
        let name_end = self.reader.peek_offset();
        let suffix = read_suffix(&mut self.reader)?;
        let closes_annotation = next_is(&mut self.reader, b'>')?;
        self.reader.commit_peek();

        let end = self.reader.offset();
        let args = self.build_args(suffix, self.location(start, end), logger);
        self.flush();
        self.end_overdue();
        if closes_annotation {
            self.emit(ParseEvent::AnnotationEnd {
                name,
                args,
                location: self.location(start, end),
            });
        } else {
            self.emit(ParseEvent::CommandStart {
                name: name.clone(),
                args,
                range: false,
                location: self.location(start, name_end),
            });
            self.commands.push(OpenCommand::new(name, EntryKind::Command));
        }
        Ok(())
    }

    /// `<\name#element[args]`.
    fn annotation_start(&mut self, start: SourceOffset, logger: &mut dyn Logger) -> Result<(), Stop> {
        let Some(name) = read_identifier(&mut self.reader)? else {
            self.reader.commit_peek();
            let location = self.location(start, self.reader.offset());
            logger.error(
                ErrorKind::InvalidIdentifier,
                "expected an annotation name after <\\".to_string(),
                location,
            );
            return Ok(());
        };
        let name_end = self.reader.peek_offset();
        let suffix = read_suffix(&mut self.reader)?;
        self.reader.commit_peek();

        let end = self.reader.offset();
        let args = self.build_args(suffix, self.location(start, end), logger);
        self.flush();
        self.end_overdue();
        self.emit(ParseEvent::AnnotationStart {
            name: name.clone(),
            args,
            range: false,
            location: self.location(start, name_end),
        });
        self.commands.push(OpenCommand::new(name, EntryKind::Command));
        Ok(())
    }

    /// `\begin{name#element}[args]`: a command with an explicit default
    /// field that lasts until `\end{name}`.
    fn begin(&mut self, start: SourceOffset, logger: &mut dyn Logger) -> Result<(), Stop> {
        let after_begin = self.reader.peek_offset();
        let Some((name, element)) = read_range_name(&mut self.reader)? else {
            rewind(&mut self.reader, after_begin);
            self.reader.commit_peek();
            logger.error(
                ErrorKind::InvalidIdentifier,
                "expected \\begin{name}".to_string(),
                self.location(start, after_begin),
            );
            return Ok(());
        };
        let name_end = self.reader.peek_offset();
        let args = if peek_byte(&mut self.reader)? == Some(b'[') {
            rewind(&mut self.reader, name_end);
            Some(read_bracketed(&mut self.reader)?)
        } else {
            rewind(&mut self.reader, name_end);
            None
        };
        self.reader.commit_peek();

        let end = self.reader.offset();
        let suffix = Suffix { element, args };
        let args = self.build_args(suffix, self.location(start, end), logger);
        self.flush();
        self.end_overdue();
        self.emit(ParseEvent::CommandStart {
            name: name.clone(),
            args,
            range: true,
            location: self.location(start, name_end),
        });
        self.emit(ParseEvent::FieldStart {
            is_default: true,
            location: self.location(end, end),
        });
        let mut entry = OpenCommand::new(name, EntryKind::Range);
        entry.in_field = true;
        entry.in_default_field = true;
        entry.had_default_field = true;
        self.commands.push(entry);
        Ok(())
    }

    /// `\end{name}`.
    fn end_range(&mut self, start: SourceOffset, logger: &mut dyn Logger) -> Result<(), Stop> {
        let after_end = self.reader.peek_offset();
        let parsed = read_range_name(&mut self.reader)?;
        if parsed.is_none() {
            rewind(&mut self.reader, after_end);
        }
        self.reader.commit_peek();
        let location = self.location(start, self.reader.offset());
        let Some((name, _)) = parsed else {
            logger.error(
                ErrorKind::InvalidIdentifier,
                "expected \\end{name}".to_string(),
                location,
            );
            return Ok(());
        };

        self.flush();
        self.end_overdue();
        match self.commands.last() {
            Some(top) if top.kind == EntryKind::Range && top.name == name => {
                self.commands.pop();
                self.emit(ParseEvent::FieldEnd { location });
            }
            Some(top) if top.kind == EntryKind::Range => {
                let message = format!("got \\end{{{name}}}, but expected \\end{{{}}}", top.name);
                logger.error(ErrorKind::InvalidCommand, message, location);
            }
            _ => {
                let message = format!("got \\end{{{name}}}, but there is no open \\begin{{{name}}} here");
                logger.error(ErrorKind::InvalidCommand, message, location);
            }
        }
        Ok(())
    }

    fn build_args(&self, suffix: Suffix, location: SourceLocation, logger: &mut dyn Logger) -> Map {
        let mut args = match suffix.args {
            None => Map::new(),
            Some(None) => {
                logger.error(
                    ErrorKind::UnexpectedEnd,
                    "argument list is never closed".to_string(),
                    location,
                );
                Map::new()
            }
            Some(Some(text)) => parse_arguments(&text).unwrap_or_else(|message| {
                logger.error(ErrorKind::ArgumentValidation, message, location);
                Map::new()
            }),
        };
        match suffix.element {
            Some(element) if element.is_empty() => {
                logger.error(
                    ErrorKind::InvalidIdentifier,
                    "expected a name after #".to_string(),
                    location,
                );
            }
            Some(_) if args.contains_key("name") => {
                logger.error(
                    ErrorKind::ArgumentValidation,
                    "the name is given both with # and as argument".to_string(),
                    location,
                );
            }
            Some(element) => {
                args.insert("name".to_string(), Value::String(element));
            }
            None => {}
        }
        args
    }

    fn field_start(&mut self, is_default: bool, location: SourceLocation, logger: &mut dyn Logger) {
        self.flush();
        match self.commands.last_mut() {
            Some(top) if top.is_waiting() && top.had_default_field => {
                let message = format!(
                    "got a field start, but command \"{}\" has no field after its default field",
                    top.name
                );
                logger.error(ErrorKind::FieldAfterDefault, message, location);
                self.push_dummy();
            }
            Some(top) if top.is_waiting() => {
                top.in_field = true;
                top.in_default_field = is_default;
                self.emit(ParseEvent::FieldStart {
                    is_default,
                    location,
                });
            }
            _ => {
                logger.error(
                    ErrorKind::UnbalancedField,
                    "got a field start, but there is no command to start it for".to_string(),
                    location,
                );
                self.push_dummy();
            }
        }
    }

    fn push_dummy(&mut self) {
        let mut dummy = OpenCommand::new("", EntryKind::Dummy);
        dummy.in_field = true;
        self.commands.push(dummy);
    }

    fn field_end(&mut self, location: SourceLocation, logger: &mut dyn Logger) {
        self.flush();
        self.end_overdue();
        let Some(top) = self.commands.last_mut() else {
            return;
        };
        match top.kind {
            EntryKind::Dummy => {
                self.commands.pop();
            }
            EntryKind::Command if top.in_field => {
                top.in_field = false;
                top.had_default_field |= top.in_default_field;
                top.in_default_field = false;
                self.emit(ParseEvent::FieldEnd { location });
            }
            EntryKind::Range => {
                let message = format!(
                    "got a field end, but the innermost open element is \\begin{{{}}}",
                    top.name
                );
                logger.error(ErrorKind::UnbalancedField, message, location);
            }
            _ => {
                logger.error(
                    ErrorKind::UnbalancedField,
                    "got a field end, but there is no field to end".to_string(),
                    location,
                );
            }
        }
    }

    /// Pop the commands that will not get a field anymore.
    fn end_overdue(&mut self) {
        while self.commands.last().is_some_and(OpenCommand::is_waiting) {
            self.commands.pop();
        }
    }

    /// Emit the collected text.
    ///
    /// Whitespace between a command and its first field is dropped.
    fn flush(&mut self) {
        let Some((content, location)) = self.data.take(self.reader.source_id()) else {
            return;
        };
        if self.commands.last().is_some_and(OpenCommand::is_waiting) {
            if content.bytes().all(osml_tokenizer::is_whitespace) {
                return;
            }
            self.end_overdue();
        }
        self.emit(ParseEvent::Data { content, location });
    }

    /// Move the peek cursor past the end of the current line.
    fn skip_line(&mut self) -> Result<(), Stop> {
        while let Some(c) = peek_byte(&mut self.reader)? {
            if c == b'\n' {
                break;
            }
        }
        Ok(())
    }

    /// Move the peek cursor past the end of a block comment whose start was
    /// just peeked. Block comments nest. Returns `false` if the input ends
    /// inside the comment.
    fn skip_block_comment(&mut self, tokenizer: &Tokenizer) -> Result<bool, Stop> {
        let mut depth = 1usize;
        loop {
            let Some(token) = tokenizer.peek(&mut self.reader) else {
                if !self.reader.is_exhausted() {
                    return Err(Stop::Pending);
                }
                return Ok(false);
            };
            if token.id == self.syntax.block_comment_start {
                depth += 1;
            } else if token.id == self.syntax.block_comment_end {
                depth -= 1;
                if depth == 0 {
                    return Ok(true);
                }
            }
        }
    }

    /// Close what is still open at the end of the input.
    fn finish(&mut self, logger: &mut dyn Logger) {
        let end = self.reader.offset();
        let location = self.location(end, end);
        self.flush();
        self.end_overdue();
        while self.commands.len() > 1 {
            let Some(entry) = self.commands.pop() else {
                break;
            };
            match entry.kind {
                // Misplaced fields were reported when they were opened.
                EntryKind::Dummy => {}
                EntryKind::Range => {
                    let message = format!(
                        "reached the end of input, but \\begin{{{}}} was never ended",
                        entry.name
                    );
                    logger.error(ErrorKind::UnexpectedEnd, message, location);
                    self.emit(ParseEvent::FieldEnd { location });
                }
                EntryKind::Command if entry.in_field => {
                    let message = format!(
                        "reached the end of input, but a field of \"{}\" is still open",
                        entry.name
                    );
                    logger.error(ErrorKind::UnexpectedEnd, message, location);
                    self.emit(ParseEvent::FieldEnd { location });
                }
                _ => {}
            }
        }
        self.emit(ParseEvent::End { location });
        self.finished = true;
    }
}
