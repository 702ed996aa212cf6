//! Reconstruction of the active state from a scope signature.
//!
//! An included document continues in whatever scope the include command was
//! found in. Only the node types of that scope are known, so the deductor
//! works out which state could have produced them.

use std::collections::HashMap;

use tracing::trace;

use crate::{NodeType, StateGraph, StateId};

/// Memoized search for the states that may be active at the end of a
/// signature.
///
/// The first node type a state declares is the node it creates when it is
/// entered. A state is active at depth `d` if either
///
/// * the node at `d` is its entry node and one of its parents is active at
///   `d - 1` (`NONE` counting as active before the first node and `ALL`
///   matching any active state), or
/// * it creates the node at `d` and was already active at `d - 1`, having
///   created several nested nodes itself.
pub struct StateDeductor<'g> {
    graph: &'g StateGraph,
    signature: Vec<NodeType>,
    memo: Vec<HashMap<StateId, bool>>,
}

impl<'g> StateDeductor<'g> {
    pub fn new(graph: &'g StateGraph, signature: Vec<NodeType>) -> Self {
        let memo = vec![HashMap::new(); signature.len()];
        Self {
            graph,
            signature,
            memo,
        }
    }

    /// All states that may be active at the innermost node.
    ///
    /// An empty signature yields `[StateId::NONE]`.
    pub fn deduce(&mut self) -> Vec<StateId> {
        let Some(last) = self.signature.len().checked_sub(1) else {
            return vec![StateId::NONE];
        };
        let ids: Vec<StateId> = self.graph.ids().collect();
        let result: Vec<StateId> = ids
            .into_iter()
            .filter(|&id| self.is_active(last, id))
            .collect();
        trace!(signature = ?self.signature, ?result, "deduced states");
        result
    }

    fn is_active(&mut self, depth: usize, id: StateId) -> bool {
        if let Some(&known) = self.memo[depth].get(&id) {
            return known;
        }
        // Guards against cycles through the same (depth, state) pair.
        self.memo[depth].insert(id, false);

        let graph = self.graph;
        let state = graph.state(id);
        let ty = self.signature[depth];
        let entered = state.created_types().first() == Some(&ty);
        let active = if depth == 0 {
            entered && state.parents().contains(&StateId::NONE)
        } else {
            (state.creates_type(ty) && self.is_active(depth - 1, id))
                || (entered
                    && state.parents().iter().any(|&parent| {
                        if parent == StateId::ALL {
                            graph.ids().any(|other| self.is_active(depth - 1, other))
                        } else {
                            parent != StateId::NONE && self.is_active(depth - 1, parent)
                        }
                    }))
        };
        self.memo[depth].insert(id, active);
        active
    }
}

/// Shorthand for `StateDeductor::new(graph, signature).deduce()`.
pub fn deduce_states(graph: &StateGraph, signature: Vec<NodeType>) -> Vec<StateId> {
    StateDeductor::new(graph, signature).deduce()
}
