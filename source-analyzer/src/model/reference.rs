//! Reference candidates and resolved references.

use serde::{Deserialize, Serialize};

/// Relation kind carried by a resolved reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Calls,
    Instantiates,
    Inherits,
    Imports,
    References,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Calls => "calls",
            RefKind::Instantiates => "instantiates",
            RefKind::Inherits => "inherits",
            RefKind::Imports => "imports",
            RefKind::References => "references",
        }
    }
}

/// An unresolved outbound reference noted during extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefCandidate {
    /// Referenced name (rightmost identifier for qualified references).
    pub name: String,
    /// Receiver or module qualifier (`np` in `np.array`, `self`).
    #[serde(default)]
    pub qualifier: Option<String>,
    /// Extraction-time relation hint; resolution may refine `Calls` into
    /// `Instantiates` when the target turns out to be a class.
    pub kind: RefKind,
    /// 1-indexed source line of the reference.
    pub line: u32,
    /// Qualified name of the enclosing symbol in the referencing file, if
    /// the reference occurs inside one.
    #[serde(default)]
    pub enclosing: Option<String>,
}

/// A reference resolved to concrete symbol IDs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedReference {
    /// Canonical source node ID (`file::qualified_name` or the file node).
    pub source: String,
    /// Canonical target node ID.
    pub target: String,
    pub kind: RefKind,
    /// Resolution certainty in `[0, 1]`. High (>=0.9) means statically
    /// provable, medium (0.6-0.8) inferable, low (<=0.5) ambiguous.
    pub confidence: f32,
    pub line: u32,
}

/// Coverage counters reported by the resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    pub candidates: usize,
    pub resolved: usize,
    pub dropped_ambiguous: usize,
    pub dropped_unknown: usize,
}

/// Output of the global resolution pass.
#[derive(Debug, Clone, Default)]
pub struct ResolvedReferences {
    pub references: Vec<ResolvedReference>,
    pub stats: ResolutionStats,
}
