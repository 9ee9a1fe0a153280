//! Request/response contract of the Q&A surface.

use serde::{Deserialize, Serialize};

/// Incoming question.
#[derive(Debug, Clone, Deserialize)]
pub struct QaRequest {
    pub question: String,
    /// Continue an existing CGRAG session.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Bypass CGRAG: one LLM pass over the initial context.
    #[serde(default)]
    pub quick_mode: bool,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Allow graph-walking retrievers (on by default).
    #[serde(default = "default_true")]
    pub use_graph: bool,
}

fn default_true() -> bool {
    true
}

impl QaRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            session_id: None,
            quick_mode: false,
            temperature: None,
            use_graph: true,
        }
    }
}

/// One cited source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u32>,
}

/// Answer confidence, derived from the initial search distribution and
/// never from the LLM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// What the retrieval layer actually did for this answer.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SearchQuality {
    pub semantic_searched: bool,
    pub fts_searched: bool,
    pub results_found: usize,
    pub results_used: usize,
}

/// CGRAG loop statistics, absent in quick mode.
#[derive(Debug, Clone, Serialize)]
pub struct CgragStats {
    pub passes_used: usize,
    pub gaps_identified: usize,
    pub gaps_resolved: usize,
    pub gaps_unresolved: usize,
    pub session_id: String,
    pub context_from_cache: bool,
}

/// Final response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct QaResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub confidence: Confidence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
    pub search_quality: SearchQuality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgrag: Option<CgragStats>,
}

/// Streaming event. `Done` carries the final parsed answer; raw tags never
/// reach the stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QaEvent {
    Status { message: String },
    Done { response: QaResponse },
    Error { message: String },
}

/// Pre-computed issue surfaced by the generation pipeline, fed to the
/// analytical retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRef {
    pub file_path: String,
    pub severity: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}
