//! The chain of nodes the parser is currently inside.

use std::fmt;

use osml_tokenizer::SourceLocation;

/// A named node type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeType(&'static str);

impl NodeType {
    pub const DOCUMENT: NodeType = NodeType("document");
    pub const STRUCTURE: NodeType = NodeType("structure");
    pub const FIELD: NodeType = NodeType("field");

    /// A custom node type.
    pub const fn new(name: &'static str) -> Self {
        NodeType(name)
    }

    pub fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// One node of the scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeNode {
    pub ty: NodeType,
    pub name: String,
    pub location: SourceLocation,
}

impl ScopeNode {
    pub fn new(ty: NodeType, name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            ty,
            name: name.into(),
            location,
        }
    }
}

/// Nodes entered by handlers, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    nodes: Vec<ScopeNode>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: ScopeNode) {
        self.nodes.push(node);
    }

    pub fn pop(&mut self) -> Option<ScopeNode> {
        self.nodes.pop()
    }

    /// Drop every node beyond the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[ScopeNode] {
        &self.nodes
    }

    /// The innermost node.
    pub fn leaf(&self) -> Option<&ScopeNode> {
        self.nodes.last()
    }

    /// The node types from the outermost to the innermost node.
    pub fn signature(&self) -> Vec<NodeType> {
        self.nodes.iter().map(|node| node.ty).collect()
    }
}
