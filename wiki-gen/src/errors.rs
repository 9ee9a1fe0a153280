//! Error types for the generation pipeline.
//!
//! Only I/O and signature-store corruption are fatal to a run; per-file
//! parse and LLM failures are handled inline and never surface here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("analysis error: {0}")]
    Analyzer(#[from] source_analyzer::AnalyzerError),

    #[error("graph error: {0}")]
    Graph(#[from] code_graph::GraphError),

    #[error("code index error: {0}")]
    Index(#[from] code_index::IndexError),

    #[error("rag error: {0}")]
    Rag(#[from] wiki_rag::RagError),

    #[error("signature store corrupt: {0}")]
    SignatureStore(String),

    #[error("generation cancelled")]
    Cancelled,
}
