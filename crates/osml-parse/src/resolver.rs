//! Hooks into the embedding application: where included sources come from
//! and what magic identifiers stand for.

use std::collections::HashMap;
use std::io;

use osml_tokenizer::SourceId;

/// Locates included sources.
pub trait SourceResolver {
    /// Load `path`, as referenced from the source `relative_to`.
    fn resolve(&mut self, path: &str, relative_to: SourceId) -> io::Result<(SourceId, Vec<u8>)>;
}

/// Serves sources from memory.
///
/// Paths are matched exactly; `relative_to` is ignored.
#[derive(Debug, Clone)]
pub struct MemoryResolver {
    sources: HashMap<String, (SourceId, Vec<u8>)>,
    next_id: u32,
}

impl MemoryResolver {
    /// An empty resolver handing out ids from 1, leaving 0 to the root
    /// document.
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            next_id: 1,
        }
    }

    /// Add a source and return the id it will be reported with.
    ///
    /// Adding the same path again replaces the content but keeps the id.
    pub fn add(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> SourceId {
        let path = path.into();
        let bytes = bytes.into();
        if let Some((id, content)) = self.sources.get_mut(&path) {
            *content = bytes;
            return *id;
        }
        let id = SourceId(self.next_id);
        self.next_id += 1;
        self.sources.insert(path, (id, bytes));
        id
    }
}

impl Default for MemoryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceResolver for MemoryResolver {
    fn resolve(&mut self, path: &str, _relative_to: SourceId) -> io::Result<(SourceId, Vec<u8>)> {
        self.sources.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no source named {path:?}"))
        })
    }
}

/// Resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSources;

impl SourceResolver for NoSources {
    fn resolve(&mut self, path: &str, _relative_to: SourceId) -> io::Result<(SourceId, Vec<u8>)> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("includes are not available (requested {path:?})"),
        ))
    }
}

/// Looks up the value of identifier-shaped data in tree fields.
pub trait ConstantResolver {
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Knows no constants.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConstants;

impl ConstantResolver for NoConstants {
    fn resolve(&self, _name: &str) -> Option<String> {
        None
    }
}

impl ConstantResolver for HashMap<String, String> {
    fn resolve(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}
