//! Source analysis layer: scanning, parsing, and reference resolution.
//!
//! Responsibilities:
//! - Enumerate candidate source files under a repository root, applying
//!   ignore globs, a size cap, and binary detection;
//! - Parse supported languages with Tree-sitter and extract symbols,
//!   imports, metadata facts (raises/mutates/error strings/calls), and an
//!   optional usage synopsis per file;
//! - Resolve cross-file references in a second, global pass, attaching an
//!   honest confidence score to every resolved edge.
//!
//! Parsing is best-effort: a syntactically broken file yields a degraded
//! partial result, never a pipeline failure. Only unreadable input is fatal
//! for that file.

pub mod errors;
pub mod languages;
pub mod model;
pub mod parse;
pub mod resolve;
pub mod scan;
pub mod synopsis;

pub use errors::AnalyzerError;
pub use model::language::LanguageKind;
pub use model::reference::{RefKind, ResolutionStats, ResolvedReference};
pub use model::symbol::{
    file_node_id, ImportRecord, ParsedFile, ParsedSymbol, SymbolFacts, SymbolKind,
};
pub use parse::parse_file;
pub use resolve::resolve;
pub use scan::{scan_repo, IgnoreSpec, ScanOutcome, ScannedFile};
