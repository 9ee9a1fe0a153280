//! Error types used across the RAG layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("qdrant error: {0}")]
    Qdrant(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
