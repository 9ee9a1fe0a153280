//! Error types for the Q&A engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QaError {
    #[error("code index error: {0}")]
    Index(#[from] code_index::IndexError),

    #[error("rag error: {0}")]
    Rag(#[from] wiki_rag::RagError),

    #[error("llm error: {0}")]
    Llm(#[from] llm_service::LlmError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("both search stores are unavailable")]
    StoresDown,
}
