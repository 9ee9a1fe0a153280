//! Shared LLM service with three active profiles: `fast`, `slow`, and `embedding`.
//!
//! - Lives in the same Tokio runtime as the engine.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Caches underlying HTTP clients per config (endpoint+model+key+timeout).
//! - Exposes the generation and embedding contracts the pipeline depends on,
//!   so tests can substitute scripted fakes without any network.

pub mod config;
pub mod contract;
pub mod errors;
pub mod health;
pub mod profiles;
pub mod providers;
pub mod retry;

pub use config::{LlmModelConfig, LlmProvider};
pub use contract::{EmbeddingsProvider, TextGenerator};
pub use errors::LlmError;
pub use profiles::LlmProfiles;
pub use retry::RetryPolicy;
