//! Builtin handlers and the default OSML state graph.

use std::sync::Arc;

use osml_tokenizer::TokenId;

use crate::{
    AnnotationType, Argument, Arguments, Diagnostic, EndTokenResult, ErrorKind, Handler,
    HandlerContext, HandlerInfo, HandlerResult, Map, NodeType, ParseEvent, ScopeNode, State,
    StateGraph, StateId, WILDCARD, Value, is_identifier,
};

/// Emit `content` as data, resolving it as a constant if `magic` is set and
/// it looks like an identifier.
fn emit_data(ctx: &mut HandlerContext<'_>, content: &str, magic: bool) {
    let trimmed = content.trim();
    let resolved = if magic && is_identifier(trimmed) {
        ctx.constants().resolve(trimmed)
    } else {
        None
    };
    let location = ctx.location();
    ctx.emit(ParseEvent::Data {
        content: resolved.unwrap_or_else(|| content.to_string()),
        location,
    });
}

/// The root of every document.
///
/// The document only has its default field; no field events are emitted
/// for it.
#[derive(Debug, Clone)]
pub struct DocumentHandler {
    info: HandlerInfo,
}

impl DocumentHandler {
    pub fn create(info: &HandlerInfo) -> Box<dyn Handler> {
        Box::new(DocumentHandler { info: info.clone() })
    }
}

impl Handler for DocumentHandler {
    fn start_command(&mut self, ctx: &mut HandlerContext<'_>, _args: &mut Map) -> HandlerResult {
        let node = ScopeNode::new(NodeType::DOCUMENT, &self.info.name, ctx.location());
        ctx.scope_mut().push(node);
        Ok(true)
    }

    fn field_start(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        is_default: &mut bool,
        _index: usize,
    ) -> HandlerResult {
        Ok(*is_default)
    }

    fn data(&mut self, ctx: &mut HandlerContext<'_>, content: &str) -> HandlerResult {
        emit_data(ctx, content, true);
        Ok(true)
    }
}

/// Any command inside the document.
#[derive(Debug, Clone)]
pub struct StructureHandler {
    info: HandlerInfo,
    in_default_field: bool,
}

impl StructureHandler {
    pub fn create(info: &HandlerInfo) -> Box<dyn Handler> {
        Box::new(StructureHandler {
            info: info.clone(),
            in_default_field: false,
        })
    }
}

impl Handler for StructureHandler {
    fn start_command(&mut self, ctx: &mut HandlerContext<'_>, args: &mut Map) -> HandlerResult {
        let location = ctx.location();
        ctx.scope_mut()
            .push(ScopeNode::new(NodeType::STRUCTURE, &self.info.name, location));
        ctx.emit(ParseEvent::CommandStart {
            name: self.info.name.clone(),
            args: args.clone(),
            range: self.info.range,
            location,
        });
        Ok(true)
    }

    fn field_start(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        is_default: &mut bool,
        _index: usize,
    ) -> HandlerResult {
        let location = ctx.location();
        ctx.scope_mut()
            .push(ScopeNode::new(NodeType::FIELD, &self.info.name, location));
        ctx.emit(ParseEvent::FieldStart {
            is_default: *is_default,
            location,
        });
        self.in_default_field = *is_default;
        Ok(true)
    }

    fn field_end(&mut self, ctx: &mut HandlerContext<'_>) {
        ctx.scope_mut().pop();
        let location = ctx.location();
        ctx.emit(ParseEvent::FieldEnd { location });
        self.in_default_field = false;
    }

    fn data(&mut self, ctx: &mut HandlerContext<'_>, content: &str) -> HandlerResult {
        emit_data(ctx, content, self.in_default_field);
        Ok(true)
    }
}

/// An annotation `<\name ... \name>`.
///
/// The start and the end tag each get their own handler instance.
#[derive(Debug, Clone)]
pub struct AnnotationHandler {
    info: HandlerInfo,
    in_default_field: bool,
}

impl AnnotationHandler {
    pub fn create(info: &HandlerInfo) -> Box<dyn Handler> {
        Box::new(AnnotationHandler {
            info: info.clone(),
            in_default_field: false,
        })
    }
}

impl Handler for AnnotationHandler {
    fn start_annotation(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        args: &mut Map,
        ty: AnnotationType,
    ) -> HandlerResult {
        let location = ctx.location();
        let name = self.info.name.clone();
        let args = args.clone();
        ctx.emit(match ty {
            AnnotationType::Start => ParseEvent::AnnotationStart {
                name,
                args,
                range: self.info.range,
                location,
            },
            AnnotationType::End => ParseEvent::AnnotationEnd {
                name,
                args,
                location,
            },
        });
        Ok(true)
    }

    fn field_start(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        is_default: &mut bool,
        _index: usize,
    ) -> HandlerResult {
        let location = ctx.location();
        ctx.scope_mut()
            .push(ScopeNode::new(NodeType::FIELD, &self.info.name, location));
        ctx.emit(ParseEvent::FieldStart {
            is_default: *is_default,
            location,
        });
        self.in_default_field = *is_default;
        Ok(true)
    }

    fn field_end(&mut self, ctx: &mut HandlerContext<'_>) {
        ctx.scope_mut().pop();
        let location = ctx.location();
        ctx.emit(ParseEvent::FieldEnd { location });
        self.in_default_field = false;
    }

    fn data(&mut self, ctx: &mut HandlerContext<'_>, content: &str) -> HandlerResult {
        emit_data(ctx, content, self.in_default_field);
        Ok(true)
    }
}

/// `\include[src]`: parses another source in place.
#[derive(Debug, Clone, Default)]
pub struct IncludeHandler;

impl IncludeHandler {
    pub fn create(_info: &HandlerInfo) -> Box<dyn Handler> {
        Box::new(IncludeHandler)
    }
}

impl Handler for IncludeHandler {
    fn start_command(&mut self, ctx: &mut HandlerContext<'_>, args: &mut Map) -> HandlerResult {
        let Some(src) = args.get("src").and_then(Value::as_str) else {
            return Err(Diagnostic::error(
                ErrorKind::ArgumentValidation,
                "include needs a \"src\" argument",
                ctx.location(),
            ));
        };
        let src = src.to_string();
        ctx.include(&src)
    }

    fn field_start(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        _is_default: &mut bool,
        _index: usize,
    ) -> HandlerResult {
        Ok(false)
    }
}

type StartFn = dyn Fn(&HandlerInfo, &mut HandlerContext<'_>, &mut Map) -> HandlerResult + Send + Sync;
type AnnotationFn = dyn Fn(&HandlerInfo, &mut HandlerContext<'_>, &mut Map, AnnotationType) -> HandlerResult
    + Send
    + Sync;
type TokenFn = dyn Fn(&HandlerInfo, &mut HandlerContext<'_>, TokenId) -> HandlerResult + Send + Sync;
type EndTokenFn = dyn Fn(&HandlerInfo, &mut HandlerContext<'_>, TokenId) -> Result<EndTokenResult, Diagnostic>
    + Send
    + Sync;
type EndFn = dyn Fn(&HandlerInfo, &mut HandlerContext<'_>) + Send + Sync;
type FieldStartFn =
    dyn Fn(&HandlerInfo, &mut HandlerContext<'_>, &mut bool, usize) -> HandlerResult + Send + Sync;
type DataFn = dyn Fn(&HandlerInfo, &mut HandlerContext<'_>, &str) -> HandlerResult + Send + Sync;

/// Closures for a [`UserHandler`], one per handler operation.
///
/// Operations without a closure behave like the [`Handler`] defaults.
///
/// ```
/// use osml_parse::{ParseEvent, State, UserCallbacks};
///
/// let callbacks = UserCallbacks::new().on_data(|_, ctx, content| {
///     let location = ctx.location();
///     ctx.emit(ParseEvent::Data { content: content.to_uppercase(), location });
///     Ok(true)
/// });
/// let state = State::new("shout").handler(callbacks.into_ctor());
/// assert_eq!(state.name(), "shout");
/// ```
#[derive(Clone, Default)]
pub struct UserCallbacks {
    start_command: Option<Arc<StartFn>>,
    start_annotation: Option<Arc<AnnotationFn>>,
    start_token: Option<Arc<TokenFn>>,
    end_token: Option<Arc<EndTokenFn>>,
    end: Option<Arc<EndFn>>,
    field_start: Option<Arc<FieldStartFn>>,
    field_end: Option<Arc<EndFn>>,
    data: Option<Arc<DataFn>>,
}

impl UserCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(
        mut self,
        f: impl Fn(&HandlerInfo, &mut HandlerContext<'_>, &mut Map) -> HandlerResult
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.start_command = Some(Arc::new(f));
        self
    }

    pub fn on_annotation(
        mut self,
        f: impl Fn(&HandlerInfo, &mut HandlerContext<'_>, &mut Map, AnnotationType) -> HandlerResult
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.start_annotation = Some(Arc::new(f));
        self
    }

    pub fn on_token_start(
        mut self,
        f: impl Fn(&HandlerInfo, &mut HandlerContext<'_>, TokenId) -> HandlerResult
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.start_token = Some(Arc::new(f));
        self
    }

    pub fn on_token_end(
        mut self,
        f: impl Fn(&HandlerInfo, &mut HandlerContext<'_>, TokenId) -> Result<EndTokenResult, Diagnostic>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.end_token = Some(Arc::new(f));
        self
    }

    pub fn on_end(
        mut self,
        f: impl Fn(&HandlerInfo, &mut HandlerContext<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.end = Some(Arc::new(f));
        self
    }

    pub fn on_field_start(
        mut self,
        f: impl Fn(&HandlerInfo, &mut HandlerContext<'_>, &mut bool, usize) -> HandlerResult
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.field_start = Some(Arc::new(f));
        self
    }

    pub fn on_field_end(
        mut self,
        f: impl Fn(&HandlerInfo, &mut HandlerContext<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.field_end = Some(Arc::new(f));
        self
    }

    pub fn on_data(
        mut self,
        f: impl Fn(&HandlerInfo, &mut HandlerContext<'_>, &str) -> HandlerResult
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.data = Some(Arc::new(f));
        self
    }

    /// A handler constructor for [`State::handler`].
    pub fn into_ctor(self) -> impl Fn(&HandlerInfo) -> Box<dyn Handler> + Send + Sync + 'static {
        move |info: &HandlerInfo| -> Box<dyn Handler> {
            Box::new(UserHandler {
                info: info.clone(),
                callbacks: self.clone(),
            })
        }
    }
}

/// A handler assembled from [`UserCallbacks`].
pub struct UserHandler {
    info: HandlerInfo,
    callbacks: UserCallbacks,
}

impl Handler for UserHandler {
    fn start_command(&mut self, ctx: &mut HandlerContext<'_>, args: &mut Map) -> HandlerResult {
        match &self.callbacks.start_command {
            Some(f) => f(&self.info, ctx, args),
            None => Ok(true),
        }
    }

    fn start_annotation(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        args: &mut Map,
        ty: AnnotationType,
    ) -> HandlerResult {
        match &self.callbacks.start_annotation {
            Some(f) => f(&self.info, ctx, args, ty),
            None => Ok(true),
        }
    }

    fn start_token(&mut self, ctx: &mut HandlerContext<'_>, id: TokenId) -> HandlerResult {
        match &self.callbacks.start_token {
            Some(f) => f(&self.info, ctx, id),
            None => Ok(false),
        }
    }

    fn end_token(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        id: TokenId,
    ) -> Result<EndTokenResult, Diagnostic> {
        match &self.callbacks.end_token {
            Some(f) => f(&self.info, ctx, id),
            None => Ok(EndTokenResult::EndedNone),
        }
    }

    fn end(&mut self, ctx: &mut HandlerContext<'_>) {
        if let Some(f) = &self.callbacks.end {
            f(&self.info, ctx);
        }
    }

    fn field_start(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        is_default: &mut bool,
        index: usize,
    ) -> HandlerResult {
        match &self.callbacks.field_start {
            Some(f) => f(&self.info, ctx, is_default, index),
            None => Ok(true),
        }
    }

    fn field_end(&mut self, ctx: &mut HandlerContext<'_>) {
        if let Some(f) = &self.callbacks.field_end {
            f(&self.info, ctx);
        }
    }

    fn data(&mut self, ctx: &mut HandlerContext<'_>, content: &str) -> HandlerResult {
        match &self.callbacks.data {
            Some(f) => f(&self.info, ctx, content),
            None => Ok(true),
        }
    }
}

/// The states of plain OSML: a document holding arbitrary commands and
/// annotations, plus `\include` anywhere.
pub fn default_state_graph() -> StateGraph {
    let mut builder = StateGraph::builder();
    let document = builder.add(
        State::new("document")
            .parent(StateId::NONE)
            .creates(NodeType::DOCUMENT)
            .creates(NodeType::FIELD)
            .handler(DocumentHandler::create)
            .supports_annotations(true)
            .supports_tokens(true),
    );
    builder.add(
        State::new("include")
            .parent(StateId::ALL)
            .arguments(Arguments::new(vec![Argument::string("src")]))
            .handler(IncludeHandler::create),
    );
    let structure = builder.add(
        State::new(WILDCARD)
            .parent(document)
            .creates(NodeType::STRUCTURE)
            .creates(NodeType::FIELD)
            .handler(StructureHandler::create)
            .annotation_handler(AnnotationHandler::create)
            .supports_annotations(true)
            .supports_tokens(true),
    );
    builder.add_parent(structure, structure);
    builder.build()
}
