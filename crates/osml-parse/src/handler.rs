//! The handler interface between the parser stack and the embedder.
//!
//! Every frame on the [`ParserStack`](crate::ParserStack) owns one
//! [`Handler`]. The stack calls it for the events that reach its frame and
//! the handler answers whether it accepted them. Handlers emit output events
//! and diagnostics through the [`HandlerContext`] they are given.

use std::sync::Arc;

use osml_tokenizer::{SourceId, SourceLocation, TokenId};

use crate::{
    ConstantResolver, Diagnostic, Error, Logger, Map, ParseEvent, ParserOptions, Scope,
    SourceResolver, StateGraph, StateId, TokenRegistry,
};

/// What a handler callback returns: whether the input was accepted.
///
/// An `Err` is logged and counts as a rejection.
pub type HandlerResult = Result<bool, Diagnostic>;

/// Builds the handler for a newly entered state.
pub type HandlerCtor = Arc<dyn Fn(&HandlerInfo) -> Box<dyn Handler> + Send + Sync>;

/// Static information about the frame a handler serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerInfo {
    /// The command or annotation name as written.
    pub name: String,
    pub state: StateId,
    /// Whether the command was opened with `\begin`.
    pub range: bool,
    pub location: SourceLocation,
}

/// Whether an annotation handler is called for the start or the end tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationType {
    Start,
    End,
}

/// Answer of [`Handler::end_token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndTokenResult {
    /// The token does not close anything of this handler.
    EndedNone,
    /// The token was consumed without closing this handler's element.
    EndedHidden,
    /// The token closes the element this handler opened.
    EndedThis,
}

/// Reacts to the events reaching one stack frame.
///
/// Every method has a default, so implementations only override what they
/// care about. The defaults accept commands, fields and data silently and
/// decline tokens.
pub trait Handler {
    fn start_command(&mut self, _ctx: &mut HandlerContext<'_>, _args: &mut Map) -> HandlerResult {
        Ok(true)
    }

    fn start_annotation(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        _args: &mut Map,
        _ty: AnnotationType,
    ) -> HandlerResult {
        Ok(true)
    }

    fn start_token(&mut self, _ctx: &mut HandlerContext<'_>, _id: TokenId) -> HandlerResult {
        Ok(false)
    }

    fn end_token(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        _id: TokenId,
    ) -> Result<EndTokenResult, Diagnostic> {
        Ok(EndTokenResult::EndedNone)
    }

    /// The frame is popped.
    fn end(&mut self, _ctx: &mut HandlerContext<'_>) {}

    /// Start field number `index`.
    ///
    /// `is_default` may be set to `true` to turn the field into the default
    /// field.
    fn field_start(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        _is_default: &mut bool,
        _index: usize,
    ) -> HandlerResult {
        Ok(true)
    }

    fn field_end(&mut self, _ctx: &mut HandlerContext<'_>) {}

    /// Text found inside an open field, located at [`HandlerContext::location`].
    fn data(&mut self, _ctx: &mut HandlerContext<'_>, _content: &str) -> HandlerResult {
        Ok(true)
    }
}

/// Accepts everything and passes data through.
///
/// Used for synthetic frames, such as the frame an include resumes in, and
/// for frames of commands that could not be placed.
#[derive(Debug, Clone, Default)]
pub struct EmptyHandler;

impl EmptyHandler {
    pub fn create(_info: &HandlerInfo) -> Box<dyn Handler> {
        Box::new(EmptyHandler)
    }
}

impl Handler for EmptyHandler {
    fn data(&mut self, ctx: &mut HandlerContext<'_>, content: &str) -> HandlerResult {
        ctx.emit(ParseEvent::Data {
            content: content.to_string(),
            location: ctx.location(),
        });
        Ok(true)
    }
}

/// Everything a handler may touch while it runs.
pub struct HandlerContext<'s> {
    pub(crate) graph: &'s StateGraph,
    pub(crate) logger: &'s mut dyn Logger,
    pub(crate) resolver: &'s mut dyn SourceResolver,
    pub(crate) constants: &'s dyn ConstantResolver,
    pub(crate) options: &'s ParserOptions,
    pub(crate) includes: &'s [SourceId],
    pub(crate) scope: &'s mut Scope,
    pub(crate) tokens: &'s mut TokenRegistry,
    /// Tokens registered on behalf of the current frame.
    pub(crate) registered: &'s mut Vec<TokenId>,
    pub(crate) events: &'s mut Vec<ParseEvent>,
    pub(crate) fatal: &'s mut Option<Error>,
    pub(crate) location: SourceLocation,
}

impl<'s> HandlerContext<'s> {
    /// Location of the syntax element being handled.
    pub fn location(&self) -> SourceLocation {
        self.location
    }

    pub fn logger(&mut self) -> &mut dyn Logger {
        &mut *self.logger
    }

    /// Append an event to the output.
    pub fn emit(&mut self, event: ParseEvent) {
        self.events.push(event);
    }

    pub fn scope(&self) -> &Scope {
        &*self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope {
        &mut *self.scope
    }

    pub fn graph(&self) -> &StateGraph {
        self.graph
    }

    pub fn options(&self) -> &ParserOptions {
        self.options
    }

    pub fn constants(&self) -> &dyn ConstantResolver {
        self.constants
    }

    /// Sources currently being parsed, outermost first.
    pub fn include_chain(&self) -> &[SourceId] {
        self.includes
    }

    /// Register `token` for as long as the current frame lives.
    ///
    /// Returns `TokenId::EMPTY` if the token cannot be registered.
    pub fn register_token(&mut self, token: &str) -> TokenId {
        let id = self.tokens.register(token);
        if !id.is_empty() {
            self.registered.push(id);
        }
        id
    }

    /// Release one registration of `id` made by the current frame.
    pub fn unregister_token(&mut self, id: TokenId) -> bool {
        let Some(pos) = self.registered.iter().rposition(|&t| t == id) else {
            return false;
        };
        self.registered.remove(pos);
        self.tokens.unregister(id)
    }

    pub fn token_string(&self, id: TokenId) -> Option<&str> {
        self.tokens.token_string(id)
    }

    /// Stop the whole parse with `error` once the current callback returns.
    pub fn abort(&mut self, error: Error) {
        if self.fatal.is_none() {
            *self.fatal = Some(error);
        }
    }

    /// Parse the source at `path` in the current scope.
    ///
    /// The included events are appended to the output as if they had been
    /// written in place of the including command.
    pub fn include(&mut self, path: &str) -> HandlerResult {
        crate::osml::include(self, path)
    }
}
