//! Thin HTTP clients, one per provider.

pub mod ollama;
pub mod openai;

use reqwest::Response;

use crate::errors::LlmError;

/// Map a non-success HTTP response into the right error variant, consuming
/// at most a short snippet of the body.
pub(crate) async fn status_error(resp: Response) -> LlmError {
    let status = resp.status();
    let url = resp.url().to_string();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return LlmError::Auth { url };
    }
    let snippet = resp
        .text()
        .await
        .map(|b| b.chars().take(200).collect::<String>())
        .unwrap_or_default();
    LlmError::HttpStatus {
        status,
        url,
        snippet,
    }
}
