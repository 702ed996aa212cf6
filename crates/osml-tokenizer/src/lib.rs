//! Source reader, token trie and whitespace-aware tokenizer for OSML

mod span;
pub use span::{INVALID_OFFSET, SourceId, SourceLocation, SourceOffset};

mod token;
pub use token::{Token, TokenId, WhitespaceMode};

mod error;
pub use error::TokenizerError;

mod reader;
pub use reader::SourceReader;

mod trie;
pub use trie::{TokenTrie, TrieNode};

mod whitespace;
pub use whitespace::{WhitespaceHandler, is_whitespace};

mod tokenizer;
pub use tokenizer::Tokenizer;

mod code;
pub use code::{CodeTokenFilter, CodeTokenMode, TokenDescriptor};
