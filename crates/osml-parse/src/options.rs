//! Parser configuration.

use osml_tokenizer::WhitespaceMode;

/// Options shared by the stream parser and the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// How whitespace inside data runs is treated.
    pub whitespace: WhitespaceMode,
    /// How deeply includes may nest.
    pub max_include_depth: usize,
}

impl ParserOptions {
    pub fn with_whitespace(mut self, whitespace: WhitespaceMode) -> Self {
        self.whitespace = whitespace;
        self
    }

    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            whitespace: WhitespaceMode::Collapse,
            max_include_depth: 32,
        }
    }
}
