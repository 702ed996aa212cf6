//! The graph of parser states.
//!
//! A state is entered when a command with its name (or any name, for the
//! wildcard `*`) appears while one of its parent states is active. The two
//! pseudo states [`StateId::NONE`] and [`StateId::ALL`] stand for "the stack
//! is empty" and "any state".

use std::fmt;
use std::sync::Arc;

use crate::{Arguments, EmptyHandler, Handler, HandlerCtor, HandlerInfo, NodeType};

/// Index of a state in its [`StateGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub(crate) u32);

impl StateId {
    /// Active while the stack is empty.
    pub const NONE: StateId = StateId(0);
    /// Matches every state when used as a parent.
    pub const ALL: StateId = StateId(1);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            StateId::NONE => f.write_str("<none>"),
            StateId::ALL => f.write_str("<all>"),
            StateId(id) => write!(f, "S{id}"),
        }
    }
}

/// The command name matching any command.
pub const WILDCARD: &str = "*";

/// Description of one parser state.
#[derive(Clone)]
pub struct State {
    name: String,
    parents: Vec<StateId>,
    arguments: Arguments,
    created_types: Vec<NodeType>,
    handler: HandlerCtor,
    annotation_handler: Option<HandlerCtor>,
    supports_annotations: bool,
    supports_tokens: bool,
}

impl State {
    /// A state entered by commands called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parents: Vec::new(),
            arguments: Arguments::any(),
            created_types: Vec::new(),
            handler: Arc::new(EmptyHandler::create),
            annotation_handler: None,
            supports_annotations: false,
            supports_tokens: false,
        }
    }

    pub fn parent(mut self, parent: StateId) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }

    /// Declare a node type the handler of this state pushes onto the scope.
    pub fn creates(mut self, ty: NodeType) -> Self {
        self.created_types.push(ty);
        self
    }

    pub fn handler(
        mut self,
        ctor: impl Fn(&HandlerInfo) -> Box<dyn Handler> + Send + Sync + 'static,
    ) -> Self {
        self.handler = Arc::new(ctor);
        self
    }

    /// The handler used when the state is entered by an annotation.
    pub fn annotation_handler(
        mut self,
        ctor: impl Fn(&HandlerInfo) -> Box<dyn Handler> + Send + Sync + 'static,
    ) -> Self {
        self.annotation_handler = Some(Arc::new(ctor));
        self
    }

    pub fn supports_annotations(mut self, yes: bool) -> Self {
        self.supports_annotations = yes;
        self
    }

    pub fn supports_tokens(mut self, yes: bool) -> Self {
        self.supports_tokens = yes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parents(&self) -> &[StateId] {
        &self.parents
    }

    pub fn get_arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn created_types(&self) -> &[NodeType] {
        &self.created_types
    }

    pub fn creates_type(&self, ty: NodeType) -> bool {
        self.created_types.contains(&ty)
    }

    pub fn allows_annotations(&self) -> bool {
        self.supports_annotations
    }

    pub fn allows_tokens(&self) -> bool {
        self.supports_tokens
    }

    /// Build the handler for a command entering this state.
    pub fn create_handler(&self, info: &HandlerInfo) -> Box<dyn Handler> {
        (self.handler)(info)
    }

    /// Build the handler for an annotation entering this state.
    pub fn create_annotation_handler(&self, info: &HandlerInfo) -> Box<dyn Handler> {
        match &self.annotation_handler {
            Some(ctor) => ctor(info),
            None => (self.handler)(info),
        }
    }

    fn reachable_from(&self, from: StateId) -> bool {
        self.parents
            .iter()
            .any(|&p| p == from || (p == StateId::ALL && from != StateId::NONE))
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("parents", &self.parents)
            .field("arguments", &self.arguments)
            .field("created_types", &self.created_types)
            .field("supports_annotations", &self.supports_annotations)
            .field("supports_tokens", &self.supports_tokens)
            .finish_non_exhaustive()
    }
}

/// An immutable set of states.
#[derive(Debug, Clone)]
pub struct StateGraph {
    states: Vec<State>,
}

impl StateGraph {
    pub fn builder() -> StateGraphBuilder {
        StateGraphBuilder::new()
    }

    /// Look up a state. The pseudo states resolve to empty placeholders.
    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.index()]
    }

    /// Ids of all real states, in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = StateId> + '_ {
        (2..self.states.len() as u32).map(StateId)
    }

    /// The state entered by command `name` while `from` is active.
    ///
    /// States named exactly `name` win over the wildcard; among several
    /// candidates the first declared one is used.
    pub fn transition(&self, from: StateId, name: &str) -> Option<StateId> {
        self.find(from, |state| state.name == name)
            .or_else(|| self.find(from, |state| state.name == WILDCARD))
    }

    fn find(&self, from: StateId, pred: impl Fn(&State) -> bool) -> Option<StateId> {
        self.ids()
            .find(|&id| {
                let state = self.state(id);
                pred(state) && state.reachable_from(from)
            })
    }

    /// Names of the commands accepted while `from` is active.
    pub fn expected_commands(&self, from: StateId) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .ids()
            .map(|id| self.state(id))
            .filter(|state| state.reachable_from(from))
            .map(|state| state.name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Collects states for a [`StateGraph`].
pub struct StateGraphBuilder {
    states: Vec<State>,
}

impl StateGraphBuilder {
    fn new() -> Self {
        Self {
            states: vec![State::new("<none>"), State::new("<all>")],
        }
    }

    /// Add a state and return its id.
    pub fn add(&mut self, state: State) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.states.push(state);
        id
    }

    /// Add a parent to an already added state; used for self-recursive states.
    pub fn add_parent(&mut self, state: StateId, parent: StateId) {
        self.states[state.index()].parents.push(parent);
    }

    pub fn build(self) -> StateGraph {
        StateGraph {
            states: self.states,
        }
    }
}
