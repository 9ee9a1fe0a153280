//! Mode-routed retrievers.
//!
//! Dispatch is a match over the closed [`crate::QueryMode`] set, so adding
//! a mode without a retriever fails to compile. Each retriever produces
//! the same [`RetrievedContext`] shape: ordered context blocks plus flags
//! describing what was consulted.

pub mod analytical;
pub mod conceptual;
pub mod diagnostic;
pub mod exploratory;

/// One block of retrieved context.
#[derive(Debug, Clone)]
pub struct ContextBlock {
    /// Where this block came from: `code-index`, `graph-trace`,
    /// `hybrid-search`, `issues`, `gap-lookup`.
    pub origin: String,
    pub source_path: Option<String>,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
    pub text: String,
}

impl ContextBlock {
    /// Stable dedup key for session caching.
    pub fn key(&self) -> String {
        match (&self.source_path, self.line_start, self.line_end) {
            (Some(p), Some(s), Some(e)) => format!("{p}:{s}-{e}"),
            (Some(p), _, _) => format!("{p}:{}", self.origin),
            _ => format!("{}:{:x}", self.origin, blake_ish(&self.text)),
        }
    }
}

// cheap content fingerprint for blocks without a source path
fn blake_ish(text: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut h = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut h);
    h.finish()
}

/// Output of any retriever.
#[derive(Debug, Clone, Default)]
pub struct RetrievedContext {
    pub blocks: Vec<ContextBlock>,
    pub used_code_index: bool,
    pub semantic_searched: bool,
    pub fts_searched: bool,
    /// Total raw results before budgeting.
    pub results_found: usize,
    /// Semantic distances of the initial results, for confidence.
    pub distances: Vec<f32>,
}
