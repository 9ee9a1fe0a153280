//! Error types shared by all LLM providers and profiles.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced by the LLM service.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Configuration is missing or inconsistent.
    #[error("llm config error: {0}")]
    Config(String),

    /// Transport/HTTP client error (connect, timeout, TLS).
    #[error("llm transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream returned a non-successful HTTP status.
    #[error("llm upstream status {status} from {url}: {snippet}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        snippet: String,
    },

    /// Authentication rejected by the provider. Never retried.
    #[error("llm auth failure from {url}")]
    Auth { url: String },

    /// Response body could not be decoded into the expected shape.
    #[error("llm decode error: {0}")]
    Decode(String),

    /// All retry attempts were exhausted.
    #[error("llm retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl LlmError {
    /// Whether the error is worth retrying with backoff.
    ///
    /// Rate limits and server-side errors are transient; auth failures and
    /// malformed responses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::HttpStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            LlmError::Auth { .. }
            | LlmError::Config(_)
            | LlmError::Decode(_)
            | LlmError::RetriesExhausted { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_transient() {
        let e = LlmError::HttpStatus {
            status: StatusCode::TOO_MANY_REQUESTS,
            url: "http://x".into(),
            snippet: String::new(),
        };
        assert!(e.is_transient());
    }

    #[test]
    fn auth_is_not_transient() {
        let e = LlmError::Auth {
            url: "http://x".into(),
        };
        assert!(!e.is_transient());
    }

    #[test]
    fn server_error_is_transient_client_error_is_not() {
        let server = LlmError::HttpStatus {
            status: StatusCode::BAD_GATEWAY,
            url: "http://x".into(),
            snippet: String::new(),
        };
        let client = LlmError::HttpStatus {
            status: StatusCode::BAD_REQUEST,
            url: "http://x".into(),
            snippet: String::new(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
    }
}
