//! Lightweight Ollama client for text generation and embeddings.
//!
//! Talks to the local Ollama API:
//! - `POST {endpoint}/api/generate`   for synchronous generation (`stream=false`)
//! - `POST {endpoint}/api/embeddings` for embeddings retrieval

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::{LlmModelConfig, LlmProvider},
    errors::LlmError,
    providers::status_error,
};

pub struct OllamaClient {
    http: reqwest::Client,
    cfg: LlmModelConfig,
    url_generate: String,
    url_embeddings: String,
}

impl OllamaClient {
    pub fn new(cfg: LlmModelConfig) -> Result<Self, LlmError> {
        if cfg.provider != LlmProvider::Ollama {
            return Err(LlmError::Config(
                "OllamaClient requires provider=ollama".into(),
            ));
        }
        cfg.validate()?;

        let base = cfg.endpoint.trim_end_matches('/');
        let url_generate = format!("{base}/api/generate");
        let url_embeddings = format!("{base}/api/embeddings");

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = cfg.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            cfg,
            url_generate,
            url_embeddings,
        })
    }

    /// Generate a completion. The optional system message is prepended to
    /// the prompt because `/api/generate` has no dedicated system slot.
    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: Option<f32>,
    ) -> Result<String, LlmError> {
        #[derive(Serialize)]
        struct Options {
            #[serde(skip_serializing_if = "Option::is_none")]
            temperature: Option<f32>,
            #[serde(skip_serializing_if = "Option::is_none")]
            num_predict: Option<u32>,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            prompt: String,
            stream: bool,
            options: Options,
        }
        #[derive(Deserialize)]
        struct Resp {
            response: Option<String>,
        }

        let full_prompt = match system {
            Some(s) if !s.trim().is_empty() => format!("{s}\n\n{prompt}"),
            _ => prompt.to_string(),
        };

        debug!(
            model = %self.cfg.model,
            prompt_len = full_prompt.len(),
            "ollama generate"
        );

        let body = Req {
            model: &self.cfg.model,
            prompt: full_prompt,
            stream: false,
            options: Options {
                temperature: temperature.or(self.cfg.temperature),
                num_predict: self.cfg.max_tokens,
            },
        };

        let resp = self.http.post(&self.url_generate).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }
        let data: Resp = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        data.response
            .ok_or_else(|| LlmError::Decode("missing `response` field".into()))
    }

    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, LlmError> {
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            prompt: &'a str,
        }
        #[derive(Deserialize)]
        struct Resp {
            embedding: Option<Vec<f32>>,
        }

        let body = Req {
            model: &self.cfg.model,
            prompt: input,
        };
        let resp = self
            .http
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }
        let data: Resp = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        data.embedding
            .filter(|v| !v.is_empty())
            .ok_or_else(|| LlmError::Decode("missing or empty `embedding` field".into()))
    }
}
