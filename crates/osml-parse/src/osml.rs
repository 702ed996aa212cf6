//! The complete pipeline: a stream parser feeding a parser stack.

use osml_tokenizer::{SourceId, SourceLocation, SourceReader};
use tracing::debug;

use crate::{
    ConstantResolver, Diagnostic, Error, ErrorKind, HandlerContext, HandlerResult, Logger, Map,
    NoConstants, OsmlStreamParser, ParseEvent, ParserOptions, ParserStack, SourceResolver,
    StateGraph, default_state_graph, deduce_states,
};

/// Parses OSML documents against a state graph.
///
/// ```
/// use osml_parse::{CollectingLogger, NoSources, OsmlParser, dump_events};
/// use osml_tokenizer::SourceId;
///
/// let parser = OsmlParser::default();
/// let mut logger = CollectingLogger::new();
/// let events = parser
///     .parse(SourceId(0), "\\emph{hi}", &mut logger, &mut NoSources)
///     .unwrap();
/// assert_eq!(
///     dump_events(&events),
///     "CommandStart emph {} #0[0,5)\nFieldStart #0[5,6)\nData \"hi\" #0[6,8)\nFieldEnd #0[8,9)\nEnd #0[9,9)\n"
/// );
/// ```
pub struct OsmlParser {
    graph: StateGraph,
    options: ParserOptions,
    constants: Box<dyn ConstantResolver>,
    root_command: String,
}

impl OsmlParser {
    pub fn new(graph: StateGraph, options: ParserOptions) -> Self {
        Self {
            graph,
            options,
            constants: Box::new(NoConstants),
            root_command: "document".to_string(),
        }
    }

    /// Resolve magic data with `constants`.
    pub fn with_constants(mut self, constants: impl ConstantResolver + 'static) -> Self {
        self.constants = Box::new(constants);
        self
    }

    /// The command implicitly opened before the first byte, `document` by
    /// default.
    pub fn with_root_command(mut self, name: impl Into<String>) -> Self {
        self.root_command = name.into();
        self
    }

    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parse a complete source and return the events the handlers emitted.
    ///
    /// Recoverable problems go to `logger`; the error is returned for the
    /// fatal ones only.
    pub fn parse(
        &self,
        source: SourceId,
        bytes: impl Into<Vec<u8>>,
        logger: &mut dyn Logger,
        resolver: &mut dyn SourceResolver,
    ) -> Result<Vec<ParseEvent>, Error> {
        self.parse_reader(SourceReader::from_bytes(source, bytes), logger, resolver)
    }

    /// Like [`parse`](Self::parse), reading until `reader` is exhausted. A
    /// pushed reader is closed first.
    pub fn parse_reader(
        &self,
        mut reader: SourceReader,
        logger: &mut dyn Logger,
        resolver: &mut dyn SourceResolver,
    ) -> Result<Vec<ParseEvent>, Error> {
        reader.close();
        let source = reader.source_id();
        let mut stack = ParserStack::new(
            &self.graph,
            &self.options,
            logger,
            resolver,
            self.constants.as_ref(),
        );
        stack.set_includes(vec![source]);
        stack.command_start(
            &self.root_command,
            Map::new(),
            false,
            SourceLocation::empty(source, 0),
        )?;
        run(&mut stack, reader)?;
        Ok(stack.into_events())
    }
}

impl Default for OsmlParser {
    fn default() -> Self {
        Self::new(default_state_graph(), ParserOptions::default())
    }
}

/// Feed every surface event of `reader` into `stack`.
fn run(stack: &mut ParserStack<'_>, reader: SourceReader) -> Result<(), Error> {
    let options = stack.options();
    let mut stream = OsmlStreamParser::new(reader, stack.tokenizer_mut(), options);
    loop {
        let (tokenizer, logger) = stack.stream_env();
        let Some(event) = stream.next_event(tokenizer, logger)? else {
            break;
        };
        stack.handle(event)?;
    }
    Ok(())
}

/// Parse the source at `path` in the scope of `ctx` and append its events.
pub(crate) fn include(ctx: &mut HandlerContext<'_>, path: &str) -> HandlerResult {
    let location = ctx.location;
    let max_depth = ctx.options.max_include_depth;
    if ctx.includes.len() > max_depth {
        return Err(Diagnostic::error(
            ErrorKind::IncludeFailed,
            format!("cannot include {path:?}: includes are nested more than {max_depth} deep"),
            location,
        ));
    }
    let relative_to = ctx.includes.last().copied().unwrap_or(location.source);
    let (source, bytes) = ctx.resolver.resolve(path, relative_to).map_err(|err| {
        Diagnostic::error(
            ErrorKind::IncludeFailed,
            format!("cannot include {path:?}: {err}"),
            location,
        )
    })?;
    if ctx.includes.contains(&source) {
        return Err(Diagnostic::error(
            ErrorKind::IncludeFailed,
            format!("cannot include {path:?}: it is already being parsed"),
            location,
        ));
    }

    let states = deduce_states(ctx.graph, ctx.scope.signature());
    let state = match states.as_slice() {
        [state] => *state,
        [] => {
            return Err(Diagnostic::error(
                ErrorKind::IncludeFailed,
                format!("cannot include {path:?}: no state matches the current scope"),
                location,
            ));
        }
        _ => {
            let names: Vec<&str> = states
                .iter()
                .map(|&id| ctx.graph.state(id).name())
                .collect();
            ctx.abort(Error::new(
                ErrorKind::IncludeAmbiguous,
                format!(
                    "cannot include {path:?}: the current scope matches several states: {}",
                    names.join(", ")
                ),
                location,
            ));
            return Ok(false);
        }
    };
    debug!(path, %source, %state, "including");

    let mut includes = ctx.includes.to_vec();
    includes.push(source);
    let scope = ctx.scope.clone();
    let (result, events) = {
        let mut stack = ParserStack::new(
            ctx.graph,
            ctx.options,
            &mut *ctx.logger,
            &mut *ctx.resolver,
            ctx.constants,
        );
        stack.resume_in(scope, includes, state, location);
        let result = run(&mut stack, SourceReader::from_bytes(source, bytes));
        (result, stack.into_events())
    };
    ctx.events.extend(events);
    match result {
        Ok(()) => Ok(true),
        Err(err) => {
            ctx.abort(err);
            Ok(false)
        }
    }
}
