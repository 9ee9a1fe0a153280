//! Index row model.

use serde::{Deserialize, Serialize};

/// Docstrings are truncated to this many characters at insert time.
pub const DOCSTRING_MAX_CHARS: usize = 200;

/// One indexed symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub file_path: String,
    /// Qualified name (`Class.method` for methods).
    pub symbol_name: String,
    pub kind: String,
    pub line_start: u32,
    pub line_end: u32,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub calls: Vec<String>,
    pub called_by: Vec<String>,
    pub raises: Vec<String>,
    pub mutates: Vec<String>,
    pub error_strings: Vec<String>,
    pub source_hash: String,
}

impl IndexEntry {
    /// Plain (unqualified) symbol name.
    pub fn short_name(&self) -> &str {
        self.symbol_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.symbol_name)
    }
}
