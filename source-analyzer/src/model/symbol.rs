//! Parsed symbols and files.
//!
//! A symbol's canonical ID is `file_path::qualified_name`, where the
//! qualified name is `Class.method` for methods and the plain name
//! otherwise. The file itself participates in the graph through a synthetic
//! file-level node (see [`file_node_id`]) so import edges always have
//! existing endpoints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::language::LanguageKind;
use crate::model::reference::RefCandidate;

/// Cap applied to collected error-string literals.
pub const ERROR_STRING_MAX_CHARS: usize = 100;

/// Coarse symbol kind. Only functions, methods, and classes are indexable
/// downstream; variables participate in mutation tracking and the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Variable,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Variable => "variable",
        }
    }

    pub fn is_indexable(&self) -> bool {
        matches!(
            self,
            SymbolKind::Function | SymbolKind::Method | SymbolKind::Class
        )
    }
}

/// Language-neutral facts collected while walking a symbol body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolFacts {
    /// Exception type names appearing as the target of a raise/throw.
    pub raises: Vec<String>,
    /// Module-level names or `self.attr` written by this symbol.
    pub mutates: Vec<String>,
    /// String literals from raise sites and logger-error calls, truncated.
    pub error_strings: Vec<String>,
    /// All syntactically invoked names.
    pub calls: Vec<String>,
}

impl SymbolFacts {
    /// Record an error string, applying the truncation cap and dedup.
    pub fn push_error_string(&mut self, s: &str) {
        let mut owned: String = s.chars().take(ERROR_STRING_MAX_CHARS).collect();
        owned = owned.trim().to_string();
        if !owned.is_empty() && !self.error_strings.contains(&owned) {
            self.error_strings.push(owned);
        }
    }

    pub fn push_unique(list: &mut Vec<String>, value: String) {
        if !value.is_empty() && !list.contains(&value) {
            list.push(value);
        }
    }
}

/// A named construct extracted from source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSymbol {
    /// Plain name as written in source.
    pub name: String,
    pub kind: SymbolKind,
    /// Repo-relative path with forward slashes.
    pub file_path: String,
    /// 1-indexed inclusive range.
    pub line_start: u32,
    pub line_end: u32,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub docstring: Option<String>,
    /// Enclosing class name for methods.
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub facts: SymbolFacts,
}

impl ParsedSymbol {
    /// `Class.method` for methods, plain name otherwise.
    pub fn qualified_name(&self) -> String {
        match &self.owner {
            Some(owner) => format!("{owner}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Canonical graph ID: `file_path::qualified_name`.
    pub fn id(&self) -> String {
        format!("{}::{}", self.file_path, self.qualified_name())
    }
}

/// One import statement, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    /// Module specifier as written (`os.path`, `./utils`, `crate::db`).
    pub module: String,
    /// Specific name for from-style imports; `None` for whole-module.
    #[serde(default)]
    pub name: Option<String>,
    /// Local alias when present.
    #[serde(default)]
    pub alias: Option<String>,
    pub line: u32,
}

impl ImportRecord {
    /// The identifier this import binds locally.
    pub fn local_binding(&self) -> &str {
        if let Some(alias) = &self.alias {
            return alias;
        }
        if let Some(name) = &self.name {
            return name;
        }
        // `import a.b.c` binds `a` in Python; for path-like specifiers the
        // last segment is the binding.
        let m = self.module.as_str();
        if m.contains('/') {
            m.rsplit('/').next().unwrap_or(m)
        } else if m.contains("::") {
            m.rsplit("::").next().unwrap_or(m)
        } else {
            m.split('.').next().unwrap_or(m)
        }
    }
}

/// Result of parsing one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedFile {
    /// Repo-relative path with forward slashes.
    pub path: String,
    pub language: LanguageKind,
    /// Raw content handle.
    pub content: String,
    pub line_count: u32,
    /// Lowercase hex SHA-256 of the content.
    pub source_hash: String,
    pub symbols: Vec<ParsedSymbol>,
    pub imports: Vec<ImportRecord>,
    /// Unresolved outbound references, input for the resolution pass.
    pub candidates: Vec<RefCandidate>,
    /// Same-file `var -> ClassName` bindings from explicit instantiations.
    #[serde(default)]
    pub local_types: HashMap<String, String>,
    /// Usage example extracted from the file's own documentation.
    #[serde(default)]
    pub synopsis: Option<String>,
    /// True when the source had syntax errors and extraction was partial.
    #[serde(default)]
    pub parse_degraded: bool,
}

impl ParsedFile {
    /// Names assigned at module level, used by the mutation tracker.
    pub fn module_level_names(&self) -> Vec<&str> {
        self.symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Variable && s.owner.is_none())
            .map(|s| s.name.as_str())
            .collect()
    }
}

/// ID of the synthetic file-level graph node for `path`.
pub fn file_node_id(path: &str) -> String {
    format!("{path}::<file>")
}
