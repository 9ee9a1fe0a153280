//! Parsing entry point.
//!
//! Creates a Tree-sitter parser per call, dispatches to the language
//! extractor, and assembles the [`ParsedFile`]. Syntax errors downgrade the
//! result (empty or partial symbols, `parse_degraded=true`) instead of
//! failing; only unreadable input is an error.

use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use tree_sitter::Parser;

use crate::errors::AnalyzerError;
use crate::languages::{ecma, python, rust};
use crate::model::language::LanguageKind;
use crate::model::symbol::ParsedFile;
use crate::synopsis::extract_synopsis;

/// Parse one file's content into symbols, imports, and candidates.
///
/// `path` is the repo-relative path used in symbol IDs. A grammar-level
/// failure (tree could not be produced at all) yields an empty degraded
/// result rather than an error, per the pipeline's partial-parse policy.
pub fn parse_file(
    path: &str,
    content: &str,
    language: LanguageKind,
) -> Result<ParsedFile, AnalyzerError> {
    let mut parser = Parser::new();
    set_language(&mut parser, language)?;

    debug!("parse: {path} ({language})");

    let source_hash = sha256_hex(content.as_bytes());
    let line_count = content.lines().count() as u32;

    let Some(tree) = parser.parse(content, None) else {
        warn!("parse: tree-sitter produced no tree for {path}");
        return Ok(degraded_file(path, content, language, source_hash, line_count));
    };

    let root = tree.root_node();
    let parse_degraded = root.has_error();
    if parse_degraded {
        warn!("parse: syntax errors in {path}, extraction is best-effort");
    }

    let (symbols, imports, candidates, local_types) = match language {
        LanguageKind::Python => {
            let e = python::extract(&root, content, path);
            (e.symbols, e.imports, e.candidates, e.local_types)
        }
        LanguageKind::Rust => {
            let e = rust::extract(&root, content, path);
            (e.symbols, e.imports, e.candidates, e.local_types)
        }
        LanguageKind::TypeScript | LanguageKind::JavaScript => {
            let e = ecma::extract(&root, content, path);
            (e.symbols, e.imports, e.candidates, e.local_types)
        }
    };

    let synopsis = extract_synopsis(content, language);

    Ok(ParsedFile {
        path: path.to_string(),
        language,
        content: content.to_string(),
        line_count,
        source_hash,
        symbols,
        imports,
        candidates,
        local_types,
        synopsis,
        parse_degraded,
    })
}

fn degraded_file(
    path: &str,
    content: &str,
    language: LanguageKind,
    source_hash: String,
    line_count: u32,
) -> ParsedFile {
    ParsedFile {
        path: path.to_string(),
        language,
        content: content.to_string(),
        line_count,
        source_hash,
        symbols: Vec::new(),
        imports: Vec::new(),
        candidates: Vec::new(),
        local_types: Default::default(),
        synopsis: None,
        parse_degraded: true,
    }
}

fn set_language(parser: &mut Parser, lang: LanguageKind) -> Result<(), AnalyzerError> {
    let res = match lang {
        LanguageKind::Python => parser.set_language(&tree_sitter_python::LANGUAGE.into()),
        LanguageKind::Rust => parser.set_language(&tree_sitter_rust::LANGUAGE.into()),
        LanguageKind::TypeScript => {
            parser.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
        }
        LanguageKind::JavaScript => parser.set_language(&tree_sitter_javascript::LANGUAGE.into()),
    };
    res.map_err(|e| AnalyzerError::Grammar {
        language: lang.to_string(),
        reason: e.to_string(),
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_string(&hasher.finalize())
}

fn hex_string(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{b:02x}");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::symbol::SymbolKind;

    const PY: &str = r#"
import sqlite3
import numpy as np
from api.config import settings

_db_instances = {}

def get_db(name):
    """Return a cached connection."""
    if name in _db_instances:
        return _db_instances[name]
    try:
        conn = sqlite3.connect(name)
    except sqlite3.OperationalError:
        logger.error("readonly database")
        raise RuntimeError("could not open database")
    _db_instances[name] = conn
    return conn

class NotesService:
    def list(self):
        self.cache = {}
        return query_notes()
"#;

    #[test]
    fn extracts_python_symbols_and_facts() {
        let f = parse_file("api/deps.py", PY, LanguageKind::Python).unwrap();
        assert!(!f.parse_degraded);
        assert_eq!(f.line_count, PY.lines().count() as u32);

        let get_db = f.symbols.iter().find(|s| s.name == "get_db").unwrap();
        assert_eq!(get_db.kind, SymbolKind::Function);
        assert_eq!(get_db.docstring.as_deref(), Some("Return a cached connection."));
        assert!(get_db.facts.raises.contains(&"RuntimeError".to_string()));
        assert!(get_db
            .facts
            .error_strings
            .iter()
            .any(|s| s.contains("could not open database")));
        assert!(get_db
            .facts
            .error_strings
            .iter()
            .any(|s| s.contains("readonly database")));
        assert!(get_db.facts.mutates.contains(&"_db_instances".to_string()));
        assert!(get_db.facts.calls.contains(&"connect".to_string()));

        let list = f
            .symbols
            .iter()
            .find(|s| s.name == "list" && s.owner.as_deref() == Some("NotesService"))
            .unwrap();
        assert_eq!(list.kind, SymbolKind::Method);
        assert!(list.facts.mutates.contains(&"self.cache".to_string()));
        assert!(list.facts.calls.contains(&"query_notes".to_string()));

        assert!(f.imports.iter().any(|i| i.module == "sqlite3"));
        assert!(f
            .imports
            .iter()
            .any(|i| i.module == "numpy" && i.alias.as_deref() == Some("np")));
        assert!(f
            .imports
            .iter()
            .any(|i| i.module == "api.config" && i.name.as_deref() == Some("settings")));
    }

    #[test]
    fn broken_source_is_degraded_not_fatal() {
        let f = parse_file("bad.py", "def broken(:\n  nonsense((", LanguageKind::Python).unwrap();
        assert!(f.parse_degraded);
    }

    #[test]
    fn empty_file_parses_clean() {
        let f = parse_file("empty.py", "", LanguageKind::Python).unwrap();
        assert!(f.symbols.is_empty());
        assert_eq!(f.line_count, 0);
        assert!(!f.parse_degraded);
    }

    #[test]
    fn identical_bytes_identical_output() {
        let a = parse_file("api/deps.py", PY, LanguageKind::Python).unwrap();
        let b = parse_file("api/deps.py", PY, LanguageKind::Python).unwrap();
        assert_eq!(a.source_hash, b.source_hash);
        assert_eq!(a.symbols.len(), b.symbols.len());
        for (x, y) in a.symbols.iter().zip(b.symbols.iter()) {
            assert_eq!(x.id(), y.id());
            assert_eq!(x.facts, y.facts);
        }
        assert_eq!(a.candidates, b.candidates);
    }

    #[test]
    fn extracts_rust_symbols() {
        let src = r#"
use std::collections::HashMap;

pub struct Cache;

impl Cache {
    pub fn insert(&mut self, k: String) {
        self.size = 1;
        validate(&k);
    }
}

/// Entry point.
pub fn run() {
    let c = Cache::new();
    c.insert("x".into());
    panic!("boom");
}
"#;
        let f = parse_file("src/cache.rs", src, LanguageKind::Rust).unwrap();
        let cache = f.symbols.iter().find(|s| s.name == "Cache").unwrap();
        assert_eq!(cache.kind, SymbolKind::Class);

        let insert = f
            .symbols
            .iter()
            .find(|s| s.name == "insert" && s.owner.as_deref() == Some("Cache"))
            .unwrap();
        assert_eq!(insert.kind, SymbolKind::Method);
        assert!(insert.facts.mutates.contains(&"self.size".to_string()));

        let run = f.symbols.iter().find(|s| s.name == "run").unwrap();
        assert_eq!(run.docstring.as_deref(), Some("Entry point."));
        assert!(run.facts.raises.iter().any(|r| r.starts_with("panic")));
        assert!(run
            .facts
            .error_strings
            .iter()
            .any(|s| s.contains("boom")));
    }

    #[test]
    fn extracts_typescript_symbols() {
        let src = r#"
import { getUser } from "./users";

export class SessionStore {
    save(token) {
        this.entries = {};
        if (!token) {
            throw new Error("missing token");
        }
        getUser(token);
    }
}
"#;
        let f = parse_file("web/session.ts", src, LanguageKind::TypeScript).unwrap();
        let save = f
            .symbols
            .iter()
            .find(|s| s.name == "save" && s.owner.as_deref() == Some("SessionStore"))
            .unwrap();
        assert!(save.facts.raises.contains(&"Error".to_string()));
        assert!(save
            .facts
            .error_strings
            .iter()
            .any(|s| s.contains("missing token")));
        assert!(save.facts.mutates.contains(&"this.entries".to_string()));
        assert!(save.facts.calls.contains(&"getUser".to_string()));
        assert!(f
            .imports
            .iter()
            .any(|i| i.module == "./users" && i.name.as_deref() == Some("getUser")));
    }
}
