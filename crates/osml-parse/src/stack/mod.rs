//! The pushdown stack of handler frames.
//!
//! The stack receives the surface events of a document one by one and
//! decides which handler each of them belongs to. Commands push frames,
//! fields open and close inside the topmost frame, and data goes to the
//! innermost frame with an open field. A command that is written without
//! braces gets an *implicit default field*: it swallows the following
//! content until something arrives that it cannot take, at which point the
//! stack unrolls and retries one level further out.

use osml_tokenizer::{SourceId, SourceLocation, TokenId, Tokenizer, WhitespaceMode};
use tracing::{debug, trace};

use crate::{
    AnnotationType, ConstantResolver, EmptyHandler, EndTokenResult, Error, ErrorKind, Handler,
    HandlerContext, HandlerInfo, HandlerResult, Logger, LoggerFork, Map, ParseEvent,
    ParserOptions, Scope, SourceResolver, StateGraph, StateId, TokenRegistry, Value,
};

#[cfg(test)]
mod tests;

/// Read-only configuration and external services of a stack.
pub(crate) struct Env<'a> {
    graph: &'a StateGraph,
    resolver: &'a mut dyn SourceResolver,
    constants: &'a dyn ConstantResolver,
    options: &'a ParserOptions,
    includes: Vec<SourceId>,
}

impl Env<'_> {
    fn context<'s>(
        &'s mut self,
        logger: &'s mut dyn Logger,
        shared: &'s mut Shared,
        registered: &'s mut Vec<TokenId>,
        location: SourceLocation,
    ) -> HandlerContext<'s> {
        HandlerContext {
            graph: self.graph,
            logger,
            resolver: &mut *self.resolver,
            constants: self.constants,
            options: self.options,
            includes: &self.includes,
            scope: &mut shared.scope,
            tokens: &mut shared.tokens,
            registered,
            events: &mut shared.events,
            fatal: &mut shared.fatal,
            location,
        }
    }
}

/// State handlers may modify.
struct Shared {
    scope: Scope,
    tokens: TokenRegistry,
    events: Vec<ParseEvent>,
    fatal: Option<Error>,
}

struct Frame {
    handler: Box<dyn Handler>,
    name: String,
    state: StateId,
    location: SourceLocation,
    /// False once the handler or one of its ancestors rejected its start.
    valid: bool,
    /// Synthetic frame that no command opened.
    implicit: bool,
    /// Opened by an annotation start; takes explicit fields only.
    annotation: bool,
    range: bool,
    in_field: bool,
    in_default_field: bool,
    in_implicit_default_field: bool,
    /// The handler accepted the open field.
    in_valid_field: bool,
    had_default_field: bool,
    /// Number of fields started so far.
    field_index: usize,
    /// Tokens that opened an element in this handler.
    open_tokens: Vec<TokenId>,
    /// Tokens registered by this handler.
    tokens: Vec<TokenId>,
    /// Scope length when the frame was pushed.
    scope_depth: usize,
}

impl Frame {
    fn new(handler: Box<dyn Handler>, info: HandlerInfo, scope_depth: usize) -> Self {
        Self {
            handler,
            name: info.name,
            state: info.state,
            location: info.location,
            valid: true,
            implicit: false,
            annotation: false,
            range: info.range,
            in_field: false,
            in_default_field: false,
            in_implicit_default_field: false,
            in_valid_field: false,
            had_default_field: false,
            field_index: 0,
            open_tokens: Vec::new(),
            tokens: Vec::new(),
            scope_depth,
        }
    }

    fn field_start(&mut self, is_default: bool, is_implicit: bool, is_valid: bool) {
        self.in_field = true;
        self.in_default_field = is_default || is_implicit;
        self.in_implicit_default_field = is_implicit;
        self.in_valid_field = is_valid;
        self.had_default_field = self.had_default_field || self.in_default_field;
        self.field_index += 1;
    }

    fn field_end(&mut self) {
        self.in_field = false;
        self.in_default_field = false;
        self.in_implicit_default_field = false;
        self.in_valid_field = false;
    }
}

/// An annotation waiting for its end tag.
struct OpenAnnotation {
    name: String,
    /// The element name given with `#name`, empty if none.
    element: String,
    state: StateId,
    /// Index of the frame whose field contains the annotation start.
    anchor: usize,
    /// `field_index` of the anchor at the annotation start.
    field_index: usize,
}

/// Log the error of a rejected callback and reduce the result to a flag.
fn settle(ctx: &mut HandlerContext<'_>, result: HandlerResult) -> bool {
    match result {
        Ok(accepted) => accepted,
        Err(diagnostic) => {
            ctx.logger.log(diagnostic);
            false
        }
    }
}

fn call_with<R>(
    frames: &mut [Frame],
    env: &mut Env<'_>,
    shared: &mut Shared,
    logger: &mut dyn Logger,
    index: usize,
    location: SourceLocation,
    f: impl FnOnce(&mut dyn Handler, &mut HandlerContext<'_>) -> R,
) -> R {
    let frame = &mut frames[index];
    let mut ctx = env.context(logger, shared, &mut frame.tokens, location);
    f(frame.handler.as_mut(), &mut ctx)
}

fn is_blank(content: &str) -> bool {
    content.bytes().all(osml_tokenizer::is_whitespace)
}

/// Routes surface events to handler frames.
pub struct ParserStack<'a> {
    logger: &'a mut dyn Logger,
    env: Env<'a>,
    shared: Shared,
    frames: Vec<Frame>,
    annotations: Vec<OpenAnnotation>,
    /// Location of the event being processed.
    location: SourceLocation,
    /// Set for the stacks of included sources, which emit no `End`.
    nested: bool,
}

impl<'a> ParserStack<'a> {
    /// Create an empty stack; the first command must leave [`StateId::NONE`].
    pub fn new(
        graph: &'a StateGraph,
        options: &'a ParserOptions,
        logger: &'a mut dyn Logger,
        resolver: &'a mut dyn SourceResolver,
        constants: &'a dyn ConstantResolver,
    ) -> Self {
        Self {
            logger,
            env: Env {
                graph,
                resolver,
                constants,
                options,
                includes: Vec::new(),
            },
            shared: Shared {
                scope: Scope::new(),
                tokens: TokenRegistry::new(Tokenizer::new(WhitespaceMode::Preserve)),
                events: Vec::new(),
                fatal: None,
            },
            frames: Vec::new(),
            annotations: Vec::new(),
            location: SourceLocation::invalid(),
            nested: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The state of the topmost frame.
    pub fn current_state(&self) -> StateId {
        self.frames.last().map_or(StateId::NONE, |frame| frame.state)
    }

    /// Name of the command that opened the topmost frame.
    pub fn current_name(&self) -> Option<&str> {
        self.frames.last().map(|frame| frame.name.as_str())
    }

    pub fn scope(&self) -> &Scope {
        &self.shared.scope
    }

    pub fn graph(&self) -> &'a StateGraph {
        self.env.graph
    }

    pub fn options(&self) -> &'a ParserOptions {
        self.env.options
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        self.shared.tokens.tokenizer()
    }

    pub fn tokenizer_mut(&mut self) -> &mut Tokenizer {
        self.shared.tokens.tokenizer_mut()
    }

    pub fn logger(&mut self) -> &mut dyn Logger {
        &mut *self.logger
    }

    /// What a stream parser needs while the stack is idle.
    pub(crate) fn stream_env(&mut self) -> (&Tokenizer, &mut dyn Logger) {
        (self.shared.tokens.tokenizer(), &mut *self.logger)
    }

    /// Take the events emitted so far.
    pub fn take_events(&mut self) -> Vec<ParseEvent> {
        std::mem::take(&mut self.shared.events)
    }

    pub fn into_events(self) -> Vec<ParseEvent> {
        self.shared.events
    }

    /// Continue in an existing scope: `state` is entered without a command
    /// and stays open until the end of input.
    pub(crate) fn resume_in(
        &mut self,
        scope: Scope,
        includes: Vec<SourceId>,
        state: StateId,
        location: SourceLocation,
    ) {
        self.shared.scope = scope;
        self.env.includes = includes;
        self.nested = true;
        if state == StateId::NONE {
            return;
        }
        let info = HandlerInfo {
            name: self.env.graph.state(state).name().to_string(),
            state,
            range: false,
            location,
        };
        let mut frame = Frame::new(EmptyHandler::create(&info), info, self.shared.scope.len());
        frame.implicit = true;
        frame.field_start(true, false, true);
        self.frames.push(frame);
    }

    pub(crate) fn set_includes(&mut self, includes: Vec<SourceId>) {
        self.env.includes = includes;
    }

    /// Dispatch a surface event to the matching operation.
    pub fn handle(&mut self, event: ParseEvent) -> Result<(), Error> {
        match event {
            ParseEvent::CommandStart {
                name,
                args,
                range,
                location,
            } => self.command_start(&name, args, range, location),
            ParseEvent::AnnotationStart {
                name,
                args,
                range,
                location,
            } => self.annotation_start(&name, args, range, location),
            ParseEvent::AnnotationEnd {
                name,
                args,
                location,
            } => self.annotation_end(&name, args, location),
            ParseEvent::FieldStart {
                is_default,
                location,
            } => self.field_start(is_default, location),
            ParseEvent::FieldEnd { location } => self.field_end(location),
            ParseEvent::Data { content, location } => self.data(&content, location),
            ParseEvent::TokenStart { id, location } | ParseEvent::TokenEnd { id, location } => {
                self.token(id, location)
            }
            ParseEvent::End { location } => self.end(location),
        }
    }

    /// Enter the state reached by command `name`.
    pub fn command_start(
        &mut self,
        name: &str,
        args: Map,
        range: bool,
        location: SourceLocation,
    ) -> Result<(), Error> {
        self.location = location;
        self.start(false, name, args, range, location)
    }

    /// Enter the state reached by annotation `name`.
    pub fn annotation_start(
        &mut self,
        name: &str,
        args: Map,
        range: bool,
        location: SourceLocation,
    ) -> Result<(), Error> {
        self.location = location;
        self.start(true, name, args, range, location)
    }

    fn start(
        &mut self,
        annotation: bool,
        name: &str,
        args: Map,
        range: bool,
        location: SourceLocation,
    ) -> Result<(), Error> {
        let graph = self.env.graph;
        self.end_overdue_handlers()?;
        loop {
            let current = self.current_state();
            let Some(target) = graph.transition(current, name) else {
                if self.can_unroll() {
                    self.end_current_handler()?;
                    continue;
                }
                let expected = graph.expected_commands(current);
                let message = if expected.is_empty() {
                    format!("command \"{name}\" is not expected here, no command is")
                } else {
                    format!(
                        "command \"{name}\" is not expected here, expected one of: {}",
                        expected.join(", ")
                    )
                };
                self.logger.error(ErrorKind::InvalidCommand, message, location);
                self.push_invalid(name, range, location);
                return Ok(());
            };

            if !self.prepare_current_handler(location)? {
                self.logger.error(
                    ErrorKind::InvalidCommand,
                    format!("command \"{name}\" is not expected here"),
                    location,
                );
                self.push_invalid(name, range, location);
                return Ok(());
            }

            if annotation
                && let Some(parent) = self.frames.last()
                && !graph.state(parent.state).allows_annotations()
            {
                let message = format!("annotations are not allowed inside \"{}\"", parent.name);
                self.logger
                    .error(ErrorKind::InvalidCommand, message, location);
                self.push_invalid(name, range, location);
                return Ok(());
            }

            let state = graph.state(target);
            let info = HandlerInfo {
                name: name.to_string(),
                state: target,
                range,
                location,
            };
            let handler = if annotation {
                state.create_annotation_handler(&info)
            } else {
                state.create_handler(&info)
            };
            let parent_valid = self.handlers_valid();
            let parent_implicit = self
                .frames
                .last()
                .is_some_and(|frame| frame.in_implicit_default_field);
            let scope_depth = self.shared.scope.len();
            let mut frame = Frame::new(handler, info, scope_depth);
            frame.annotation = annotation;
            self.frames.push(frame);
            let index = self.frames.len() - 1;
            trace!(name, state = %target, depth = index, "push frame");

            // Errors stay private until it is clear that the command stays here.
            let mut fork = LoggerFork::new(&mut *self.logger);
            let emitted = self.shared.events.len();
            let mut valid = false;
            let mut canonical = args.clone();
            if parent_valid
                && state
                    .get_arguments()
                    .validate(&mut canonical, &mut fork, location, true)
            {
                valid = call_with(
                    &mut self.frames,
                    &mut self.env,
                    &mut self.shared,
                    &mut fork,
                    index,
                    location,
                    |handler, ctx| {
                        let result = if annotation {
                            handler.start_annotation(ctx, &mut canonical, AnnotationType::Start)
                        } else {
                            handler.start_command(ctx, &mut canonical)
                        };
                        settle(ctx, result)
                    },
                );
            }

            let retry = !valid
                && parent_implicit
                && index >= 2
                && !self.frames[index - 1].implicit
                && self.shared.fatal.is_none();
            if retry {
                drop(fork);
                self.shared.events.truncate(emitted);
                self.frames[index].valid = false;
                debug!(name, "command rejected in implicit field, retrying further out");
                self.end_current_handler()?;
                self.end_current_handler()?;
                continue;
            }
            fork.commit();
            self.check_fatal()?;

            self.frames[index].valid = parent_valid && valid;
            if annotation
                && valid
                && let Some(anchor) = index.checked_sub(1)
            {
                let element = args
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.annotations.push(OpenAnnotation {
                    name: name.to_string(),
                    element,
                    state: target,
                    anchor,
                    field_index: self.frames[anchor].field_index,
                });
            }
            return Ok(());
        }
    }

    /// Close an annotation.
    ///
    /// The newest open annotation called `name` is closed; an empty name
    /// closes the newest one. An element name given as argument `name` must
    /// match as well.
    pub fn annotation_end(
        &mut self,
        name: &str,
        mut args: Map,
        location: SourceLocation,
    ) -> Result<(), Error> {
        self.location = location;
        self.end_overdue_handlers()?;
        let element = args
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let Some(pos) = self.annotations.iter().rposition(|open| {
            (name.is_empty() || open.name == name) && (element.is_empty() || open.element == element)
        }) else {
            let message = if name.is_empty() {
                "got an annotation end, but no annotation is open".to_string()
            } else {
                format!("got the end of annotation \"{name}\", but it is not open")
            };
            self.logger
                .error(ErrorKind::AnnotationMismatch, message, location);
            return Ok(());
        };
        let open = self.annotations.remove(pos);

        let same_field = self
            .frames
            .get(open.anchor)
            .is_some_and(|frame| frame.in_field && frame.field_index == open.field_index);
        if !same_field {
            self.logger.error(
                ErrorKind::AnnotationMismatch,
                format!("annotation \"{}\" must end in the field it started in", open.name),
                location,
            );
            return Ok(());
        }
        if self.frames[open.anchor + 1..]
            .iter()
            .any(|frame| frame.in_field && !frame.in_implicit_default_field)
        {
            self.logger.error(
                ErrorKind::AnnotationMismatch,
                format!("annotation \"{}\" ends inside a field opened after it", open.name),
                location,
            );
            return Ok(());
        }
        while self.frames.len() > open.anchor + 1 {
            self.end_current_handler()?;
        }
        if !self.handlers_valid() {
            return Ok(());
        }

        let info = HandlerInfo {
            name: open.name,
            state: open.state,
            range: false,
            location,
        };
        let mut handler = self.env.graph.state(open.state).create_annotation_handler(&info);
        let mut registered = Vec::new();
        {
            let mut ctx =
                self.env
                    .context(&mut *self.logger, &mut self.shared, &mut registered, location);
            let result = handler.start_annotation(&mut ctx, &mut args, AnnotationType::End);
            settle(&mut ctx, result);
        }
        for id in registered {
            self.shared.tokens.unregister(id);
        }
        self.check_fatal()
    }

    /// Close the innermost frame opened with `\begin`.
    pub fn range_end(&mut self, location: SourceLocation) -> Result<(), Error> {
        self.location = location;
        let Some(index) = self.frames.iter().rposition(|frame| frame.range) else {
            self.logger.error(
                ErrorKind::InvalidCommand,
                "got a range end, but no range is open".to_string(),
                location,
            );
            return Ok(());
        };
        while self.frames.len() > index {
            self.end_current_handler()?;
        }
        Ok(())
    }

    /// Open a field of the topmost frame.
    pub fn field_start(&mut self, is_default: bool, location: SourceLocation) -> Result<(), Error> {
        self.location = location;
        let Some(index) = self.frames.len().checked_sub(1) else {
            self.logger.error(
                ErrorKind::UnbalancedField,
                "got a field start, but there is no command to start it for".to_string(),
                location,
            );
            return Ok(());
        };

        if self.frames[index].in_field {
            self.logger.error(
                ErrorKind::UnbalancedField,
                "got a field start, but there is no command to start it for".to_string(),
                location,
            );
            // Swallow the field so that its end does not close anything else.
            self.push_invalid("", false, location);
            if let Some(frame) = self.frames.last_mut() {
                frame.field_start(is_default, false, false);
            }
            return Ok(());
        }

        if self.frames[index].had_default_field {
            let message = format!(
                "got a field start, but command \"{}\" has no field after its default field",
                self.frames[index].name
            );
            self.logger
                .error(ErrorKind::FieldAfterDefault, message, location);
            self.push_invalid("", false, location);
            if let Some(frame) = self.frames.last_mut() {
                frame.field_start(is_default, false, false);
            }
            return Ok(());
        }

        let mut default = is_default;
        let mut valid = false;
        if self.handlers_valid() {
            let field_index = self.frames[index].field_index;
            valid = self.call_frame(index, location, |handler, ctx| {
                let result = handler.field_start(ctx, &mut default, field_index);
                settle(ctx, result)
            });
            self.check_fatal()?;
            if !valid && !default {
                let message = format!(
                    "command \"{}\" has no field {}",
                    self.frames[index].name,
                    field_index + 1
                );
                self.logger
                    .error(ErrorKind::InvalidCommand, message, location);
            }
        }
        self.frames[index].field_start(default, false, valid);
        Ok(())
    }

    /// Close the innermost explicitly opened field.
    ///
    /// Frames still waiting in implicit default fields are closed first.
    /// Closing the default field of a `\begin` frame ends that frame.
    pub fn field_end(&mut self, location: SourceLocation) -> Result<(), Error> {
        self.location = location;
        while let Some(top) = self.frames.last() {
            if (top.in_field && !top.in_implicit_default_field)
                || top.implicit
                || self.frames.len() == 1
            {
                break;
            }
            self.end_current_handler()?;
        }
        let closable = self
            .frames
            .last()
            .is_some_and(|top| top.in_field && !top.in_implicit_default_field && !top.implicit);
        if !closable {
            self.logger.error(
                ErrorKind::UnbalancedField,
                "got a field end, but there is no field to end".to_string(),
                location,
            );
            return Ok(());
        }

        let index = self.frames.len() - 1;
        let was_default = self.frames[index].in_default_field;
        if self.handlers_valid() && self.frames[index].in_valid_field {
            self.call_frame(index, location, |handler, ctx| handler.field_end(ctx));
            self.check_fatal()?;
        }
        self.frames[index].field_end();
        if self.frames[index].range && was_default {
            self.end_current_handler()?;
        }
        Ok(())
    }

    /// Pass text to the innermost frame that takes it.
    pub fn data(&mut self, content: &str, location: SourceLocation) -> Result<(), Error> {
        self.location = location;
        loop {
            let Some(index) = self.frames.len().checked_sub(1) else {
                if !is_blank(content) {
                    self.logger.error(
                        ErrorKind::UnexpectedData,
                        "there is no command here to receive data".to_string(),
                        location,
                    );
                }
                return Ok(());
            };

            if !self.ensure_in_field(location)? {
                if index > 0 && !self.frames[index].implicit {
                    self.end_current_handler()?;
                    continue;
                }
                self.logger.error(
                    ErrorKind::UnexpectedData,
                    "did not expect any data here".to_string(),
                    location,
                );
                return Ok(());
            }
            if !self.handlers_valid() {
                return Ok(());
            }
            if !self.frames[index].in_valid_field {
                self.logger.error(
                    ErrorKind::UnexpectedData,
                    "did not expect any data here".to_string(),
                    location,
                );
                return Ok(());
            }

            let implicit = self.frames[index].in_implicit_default_field;
            let mut fork = LoggerFork::new(&mut *self.logger);
            let emitted = self.shared.events.len();
            let accepted = call_with(
                &mut self.frames,
                &mut self.env,
                &mut self.shared,
                &mut fork,
                index,
                location,
                |handler, ctx| {
                    let result = handler.data(ctx, content);
                    settle(ctx, result)
                },
            );
            if !accepted && implicit && index > 0 && self.shared.fatal.is_none() {
                // Let a frame further out try; this one only got the data
                // because it happened to be waiting.
                drop(fork);
                self.shared.events.truncate(emitted);
                self.end_current_handler()?;
                continue;
            }
            fork.commit();
            return self.check_fatal();
        }
    }

    /// Route a user token.
    ///
    /// Open elements may claim it as their end first; otherwise the frames
    /// are offered it as a start, innermost first. A token nobody wants is
    /// treated as the text it was written as.
    pub fn token(&mut self, id: TokenId, location: SourceLocation) -> Result<(), Error> {
        self.location = location;
        let graph = self.env.graph;
        if self.handlers_valid() {
            for index in (0..self.frames.len()).rev() {
                if !self.frames[index].open_tokens.contains(&id) {
                    continue;
                }
                let result = self.call_frame(index, location, |handler, ctx| {
                    handler.end_token(ctx, id).unwrap_or_else(|diagnostic| {
                        ctx.logger.log(diagnostic);
                        EndTokenResult::EndedNone
                    })
                });
                self.check_fatal()?;
                match result {
                    EndTokenResult::EndedNone => continue,
                    EndTokenResult::EndedHidden => return Ok(()),
                    EndTokenResult::EndedThis => {
                        let open = &mut self.frames[index].open_tokens;
                        if let Some(pos) = open.iter().rposition(|&t| t == id) {
                            open.remove(pos);
                        }
                        while self.frames.len() > index + 1 {
                            self.end_current_handler()?;
                        }
                        self.shared.events.push(ParseEvent::TokenEnd { id, location });
                        return Ok(());
                    }
                }
            }

            for index in (0..self.frames.len()).rev() {
                if !graph.state(self.frames[index].state).allows_tokens() {
                    continue;
                }
                let accepted = self.call_frame(index, location, |handler, ctx| {
                    let result = handler.start_token(ctx, id);
                    settle(ctx, result)
                });
                self.check_fatal()?;
                if accepted {
                    self.frames[index].open_tokens.push(id);
                    self.shared
                        .events
                        .push(ParseEvent::TokenStart { id, location });
                    return Ok(());
                }
            }
        }

        let text = self.shared.tokens.token_string(id).map(str::to_string);
        match text {
            Some(text) => self.data(&text, location),
            None => Ok(()),
        }
    }

    /// Close everything at the end of input.
    pub fn end(&mut self, location: SourceLocation) -> Result<(), Error> {
        self.location = location;
        self.end_overdue_handlers()?;
        for open in std::mem::take(&mut self.annotations) {
            self.logger.error(
                ErrorKind::UnexpectedEnd,
                format!("reached the end of input, but annotation \"{}\" was never ended", open.name),
                location,
            );
        }
        while let Some(top) = self.frames.last() {
            if !top.implicit && top.in_field && !top.in_implicit_default_field {
                let message = if top.range {
                    format!("reached the end of input, but \\begin{{{}}} was never ended", top.name)
                } else {
                    format!("reached the end of input, but a field of \"{}\" is still open", top.name)
                };
                self.logger
                    .error(ErrorKind::UnexpectedEnd, message, location);
            }
            self.end_current_handler()?;
        }
        if !self.nested {
            self.shared.events.push(ParseEvent::End { location });
        }
        Ok(())
    }

    fn call_frame<R>(
        &mut self,
        index: usize,
        location: SourceLocation,
        f: impl FnOnce(&mut dyn Handler, &mut HandlerContext<'_>) -> R,
    ) -> R {
        call_with(
            &mut self.frames,
            &mut self.env,
            &mut self.shared,
            &mut *self.logger,
            index,
            location,
            f,
        )
    }

    fn check_fatal(&mut self) -> Result<(), Error> {
        match self.shared.fatal.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn handlers_valid(&self) -> bool {
        self.frames.iter().all(|frame| frame.valid)
    }

    /// Whether a missing transition may be retried one frame further out.
    fn can_unroll(&self) -> bool {
        self.frames.last().is_some_and(|top| {
            self.frames.len() > 1
                && !top.implicit
                && !top.range
                && (top.in_implicit_default_field || !top.in_field)
        })
    }

    /// A frame that absorbs everything that belongs to a misplaced command.
    fn push_invalid(&mut self, name: &str, range: bool, location: SourceLocation) {
        let info = HandlerInfo {
            name: name.to_string(),
            state: self.current_state(),
            range,
            location,
        };
        let mut frame = Frame::new(EmptyHandler::create(&info), info, self.shared.scope.len());
        frame.valid = false;
        self.frames.push(frame);
    }

    fn start_implicit_default_field(&mut self, location: SourceLocation) -> Result<bool, Error> {
        let index = self.frames.len() - 1;
        let field_index = self.frames[index].field_index;
        let started = self.call_frame(index, location, |handler, ctx| {
            let mut is_default = true;
            let result = handler.field_start(ctx, &mut is_default, field_index);
            settle(ctx, result)
        });
        self.check_fatal()?;
        if started {
            self.frames[index].field_start(true, true, true);
        }
        Ok(started)
    }

    /// Make sure the topmost frame has an open field, starting an implicit
    /// default field if possible.
    fn ensure_in_field(&mut self, location: SourceLocation) -> Result<bool, Error> {
        let Some(top) = self.frames.last() else {
            return Ok(false);
        };
        if top.in_field {
            return Ok(true);
        }
        if top.had_default_field || !top.valid || top.annotation {
            return Ok(false);
        }
        self.start_implicit_default_field(location)
    }

    /// Find a frame that can hold a new command, ending frames that cannot.
    fn prepare_current_handler(&mut self, location: SourceLocation) -> Result<bool, Error> {
        loop {
            if self.frames.is_empty() {
                return Ok(true);
            }
            if self.ensure_in_field(location)? {
                return Ok(true);
            }
            let index = self.frames.len() - 1;
            let top = &self.frames[index];
            if top.range || top.implicit || index == 0 {
                return Ok(false);
            }
            self.end_current_handler()?;
        }
    }

    fn end_overdue_handlers(&mut self) -> Result<(), Error> {
        while let Some(top) = self.frames.last() {
            let overdue =
                !top.in_field && (top.had_default_field || !top.valid || top.annotation);
            if !overdue || top.implicit || self.frames.len() == 1 {
                break;
            }
            self.end_current_handler()?;
        }
        Ok(())
    }

    /// Pop the topmost frame, closing its field and ending its handler.
    fn end_current_handler(&mut self) -> Result<(), Error> {
        let Some(index) = self.frames.len().checked_sub(1) else {
            return Ok(());
        };
        let location = self.location.start_point();
        if !self.frames[index].implicit && self.handlers_valid() {
            if self.frames[index].in_field {
                if self.frames[index].in_valid_field {
                    self.call_frame(index, location, |handler, ctx| handler.field_end(ctx));
                }
                self.frames[index].field_end();
            }
            self.call_frame(index, location, |handler, ctx| handler.end(ctx));
        }
        if let Some(frame) = self.frames.pop() {
            trace!(name = %frame.name, depth = index, "pop frame");
            for id in frame.tokens {
                self.shared.tokens.unregister(id);
            }
            self.shared.scope.truncate(frame.scope_depth);
        }
        self.annotations.retain(|open| open.anchor < index);
        self.check_fatal()
    }
}
