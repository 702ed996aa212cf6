//! Prefix trie mapping token strings to token ids.

use std::collections::BTreeMap;

use crate::TokenId;

/// One node of a [`TokenTrie`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrieNode {
    children: BTreeMap<u8, TrieNode>,
    id: TokenId,
}

impl TrieNode {
    /// The token ending at this node, `EMPTY` for intermediate nodes.
    #[inline]
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// The child reached by `c`.
    #[inline]
    pub fn child(&self, c: u8) -> Option<&TrieNode> {
        self.children.get(&c)
    }

    /// Whether any longer token continues through this node.
    #[inline]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// The set of currently registered token strings.
///
/// A node carries an id other than `EMPTY` iff some registered string ends
/// there. The root never does, since empty strings cannot be registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenTrie {
    root: TrieNode,
}

impl TokenTrie {
    /// Create an empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// The root node, used to start lookups.
    #[inline]
    pub fn root(&self) -> &TrieNode {
        &self.root
    }

    /// Whether no token is registered.
    pub fn is_empty(&self) -> bool {
        !self.root.has_children()
    }

    /// Map `token` to `id`.
    ///
    /// Returns `false` if `token` is empty, `id` is `EMPTY`, or `token` is
    /// already registered.
    pub fn register(&mut self, token: &[u8], id: TokenId) -> bool {
        if token.is_empty() || id.is_empty() {
            return false;
        }
        let mut node = &mut self.root;
        for &c in token {
            node = node.children.entry(c).or_default();
        }
        if !node.id.is_empty() {
            return false;
        }
        node.id = id;
        true
    }

    /// Remove the mapping for `token`, pruning nodes that no longer lead to
    /// any token. Returns whether a mapping was removed.
    pub fn unregister(&mut self, token: &[u8]) -> bool {
        if token.is_empty() {
            return false;
        }

        // Find the deepest node that must survive the removal: the root, a
        // node that is itself a terminal, or a node with more than one child.
        // Everything below the edge `(keep, key)` only leads to `token`.
        let mut node = &self.root;
        let mut keep_depth = 0;
        for (depth, &c) in token.iter().enumerate() {
            if depth > 0 && (!node.id.is_empty() || node.children.len() > 1) {
                keep_depth = depth;
            }
            match node.children.get(&c) {
                Some(child) => node = child,
                None => return false,
            }
        }
        if node.id.is_empty() {
            return false;
        }

        if node.has_children() {
            // Other tokens continue through this node, only clear the id.
            let mut node = &mut self.root;
            for c in token {
                match node.children.get_mut(c) {
                    Some(child) => node = child,
                    None => return false,
                }
            }
            node.id = TokenId::EMPTY;
            return true;
        }

        let mut subtree_root = &mut self.root;
        for c in &token[..keep_depth] {
            match subtree_root.children.get_mut(c) {
                Some(child) => subtree_root = child,
                None => return false,
            }
        }
        subtree_root.children.remove(&token[keep_depth]).is_some()
    }

    /// The id registered for exactly `token`, `EMPTY` if there is none.
    pub fn has(&self, token: &[u8]) -> TokenId {
        let mut node = &self.root;
        for c in token {
            match node.children.get(c) {
                Some(child) => node = child,
                None => return TokenId::EMPTY,
            }
        }
        node.id
    }
}
