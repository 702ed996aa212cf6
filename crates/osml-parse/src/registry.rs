//! Reference-counted token registration on top of a [`Tokenizer`].

use std::collections::HashMap;

use osml_tokenizer::{TokenId, Tokenizer};
use tracing::{debug, warn};

/// Lets several handlers share user tokens.
///
/// Registering the same string twice returns the same id; the token stays in
/// the tokenizer until every registration is released. Tokens the registry
/// did not register itself, such as the OSML syntax tokens, cannot be shared.
#[derive(Debug)]
pub struct TokenRegistry {
    tokenizer: Tokenizer,
    /// Registered string and reference count per id.
    entries: HashMap<TokenId, (String, usize)>,
    ids: HashMap<String, TokenId>,
}

impl TokenRegistry {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self {
            tokenizer,
            entries: HashMap::new(),
            ids: HashMap::new(),
        }
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn tokenizer_mut(&mut self) -> &mut Tokenizer {
        &mut self.tokenizer
    }

    /// Register `token`, or add a reference to an existing registration.
    ///
    /// Returns `TokenId::EMPTY` if the tokenizer refuses the token.
    pub fn register(&mut self, token: &str) -> TokenId {
        if let Some(&id) = self.ids.get(token) {
            if let Some((_, count)) = self.entries.get_mut(&id) {
                *count += 1;
            }
            return id;
        }
        let id = self.tokenizer.register_token(token);
        if id.is_empty() {
            warn!("cannot register token {token:?}");
            return TokenId::EMPTY;
        }
        self.entries.insert(id, (token.to_string(), 1));
        self.ids.insert(token.to_string(), id);
        id
    }

    /// Drop one reference to `id`, removing the token once none is left.
    pub fn unregister(&mut self, id: TokenId) -> bool {
        let Some((token, count)) = self.entries.get_mut(&id) else {
            return false;
        };
        *count -= 1;
        if *count > 0 {
            return true;
        }
        let token = std::mem::take(token);
        self.entries.remove(&id);
        self.ids.remove(&token);
        debug!("token {token:?} ({id}) no longer referenced");
        self.tokenizer.unregister_token(id)
    }

    /// Number of live references to `id`.
    pub fn ref_count(&self, id: TokenId) -> usize {
        self.entries.get(&id).map_or(0, |(_, count)| *count)
    }

    pub fn token_string(&self, id: TokenId) -> Option<&str> {
        self.tokenizer.token_string(id)
    }

    /// Remove every token this registry registered.
    pub fn clear(&mut self) {
        for (id, _) in self.entries.drain() {
            self.tokenizer.unregister_token(id);
        }
        self.ids.clear();
    }

    /// Release every registration and hand back the tokenizer.
    pub fn into_tokenizer(mut self) -> Tokenizer {
        self.clear();
        std::mem::take(&mut self.tokenizer)
    }
}

impl Drop for TokenRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}
