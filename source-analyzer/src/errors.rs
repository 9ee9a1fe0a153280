//! Error types for the analysis layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unreadable file {path}: {reason}")]
    UnreadableFile { path: String, reason: String },

    #[error("grammar error for {language}: {reason}")]
    Grammar { language: String, reason: String },

    #[error("scan error: {0}")]
    Scan(String),
}
