//! Universal model configuration shared by all providers.
//!
//! One [`LlmModelConfig`] describes one reachable model: provider, model
//! name, endpoint, optional credentials, and sampling knobs. Profiles are
//! assembled from three of these (fast/slow/embedding) in
//! [`crate::profiles`].

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::errors::LlmError;

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Ollama,
    OpenAi,
}

impl Display for LlmProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Ollama => f.write_str("ollama"),
            LlmProvider::OpenAi => f.write_str("openai"),
        }
    }
}

/// Configuration of a single model endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmModelConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl LlmModelConfig {
    /// Validate the parts every provider relies on.
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.model.trim().is_empty() {
            return Err(LlmError::Config("model name must not be empty".into()));
        }
        let ep = self.endpoint.trim();
        if !(ep.starts_with("http://") || ep.starts_with("https://")) {
            return Err(LlmError::Config(format!(
                "endpoint must start with http:// or https://, got `{}`",
                self.endpoint
            )));
        }
        if let Some(t) = self.temperature {
            if !(t.is_finite() && (0.0..=2.0).contains(&t)) {
                return Err(LlmError::Config(format!(
                    "temperature out of range 0.0..=2.0: {t}"
                )));
            }
        }
        Ok(())
    }

    /// Copy of this config with a different sampling temperature.
    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }
}

/// Read one profile from `OYA_LLM_{NAME}_*` environment variables.
///
/// Required: `_MODEL` and `_ENDPOINT`. Optional: `_PROVIDER` (defaults to
/// `ollama`), `_API_KEY`, `_TEMPERATURE`, `_MAX_TOKENS`, `_TIMEOUT_SECS`.
pub fn profile_from_env(name: &str) -> Result<LlmModelConfig, LlmError> {
    let var = |suffix: &str| std::env::var(format!("OYA_LLM_{name}_{suffix}")).ok();

    let model = var("MODEL")
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| LlmError::Config(format!("OYA_LLM_{name}_MODEL is not set")))?;
    let endpoint = var("ENDPOINT")
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| LlmError::Config(format!("OYA_LLM_{name}_ENDPOINT is not set")))?;

    let provider = match var("PROVIDER").as_deref().map(str::trim) {
        None | Some("") | Some("ollama") => LlmProvider::Ollama,
        Some("openai") => LlmProvider::OpenAi,
        Some(other) => {
            return Err(LlmError::Config(format!("unsupported provider: {other}")));
        }
    };

    let cfg = LlmModelConfig {
        provider,
        model,
        endpoint,
        api_key: var("API_KEY"),
        temperature: var("TEMPERATURE").and_then(|v| v.trim().parse().ok()),
        max_tokens: var("MAX_TOKENS").and_then(|v| v.trim().parse().ok()),
        timeout_secs: var("TIMEOUT_SECS").and_then(|v| v.trim().parse().ok()),
    };
    cfg.validate()?;
    Ok(cfg)
}
