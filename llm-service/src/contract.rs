//! Object-safe contracts for text generation and embeddings.
//!
//! The pipeline and the Q&A engine program against these traits instead of a
//! concrete provider, which keeps LLM access mockable in tests and isolates
//! the rest of the workspace from provider churn.

use std::{future::Future, pin::Pin};

use crate::errors::LlmError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Text generation contract.
///
/// `system` is an optional steering message; providers without a native
/// system slot prepend it to the prompt.
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        system: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String, LlmError>>;

    /// Generation with an explicit sampling temperature (classifier calls
    /// pin this to 0.0). Default forwards to [`TextGenerator::generate`].
    fn generate_with_temperature<'a>(
        &'a self,
        prompt: &'a str,
        system: Option<&'a str>,
        _temperature: f32,
    ) -> BoxFuture<'a, Result<String, LlmError>> {
        self.generate(prompt, system)
    }
}

/// Embedding contract.
pub trait EmbeddingsProvider: Send + Sync {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, LlmError>>;
}
