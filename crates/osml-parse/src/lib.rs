//! Streaming parser for OSML markup.
//!
//! Two layers cooperate. [`OsmlStreamParser`] turns bytes into surface
//! events: commands, annotations, fields and data. [`ParserStack`] routes
//! those events through a [`StateGraph`] of handlers, which validate the
//! structure and emit the final events. [`OsmlParser`] wires both together.

pub use osml_tokenizer::{SourceId, SourceLocation, TokenId, WhitespaceMode};

mod value;
pub use value::{Map, Value, parse_arguments, parse_value};

mod error;
pub use error::{Error, ErrorKind};

mod diagnostic;
pub use diagnostic::{Diagnostic, Severity};

mod logger;
pub use logger::{CollectingLogger, Logger, LoggerFork, TracingLogger};

mod events;
pub use events::{ParseEvent, dump_events};

mod options;
pub use options::ParserOptions;

mod scope;
pub use scope::{NodeType, Scope, ScopeNode};

mod arguments;
pub use arguments::{ArgType, Argument, Arguments};

mod handler;
pub use handler::{
    AnnotationType, EmptyHandler, EndTokenResult, Handler, HandlerContext, HandlerCtor,
    HandlerInfo, HandlerResult,
};

mod states;
pub use states::{State, StateGraph, StateGraphBuilder, StateId, WILDCARD};

mod deductor;
pub use deductor::{StateDeductor, deduce_states};

mod registry;
pub use registry::TokenRegistry;

mod resolver;
pub use resolver::{ConstantResolver, MemoryResolver, NoConstants, NoSources, SourceResolver};

mod stream;
pub use stream::{OsmlStreamParser, is_identifier};

mod stack;
pub use stack::ParserStack;

mod handlers;
pub use handlers::{
    AnnotationHandler, DocumentHandler, IncludeHandler, StructureHandler, UserCallbacks,
    UserHandler, default_state_graph,
};

mod osml;
pub use osml::OsmlParser;
