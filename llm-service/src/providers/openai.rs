//! OpenAI-compatible chat-completions client.
//!
//! Works against any endpoint that speaks `/v1/chat/completions` and
//! `/v1/embeddings`, which covers OpenAI itself and self-hosted gateways.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::{LlmModelConfig, LlmProvider},
    errors::LlmError,
    providers::status_error,
};

pub struct OpenAiClient {
    http: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
    url_embeddings: String,
}

impl OpenAiClient {
    pub fn new(cfg: LlmModelConfig) -> Result<Self, LlmError> {
        if cfg.provider != LlmProvider::OpenAi {
            return Err(LlmError::Config(
                "OpenAiClient requires provider=openai".into(),
            ));
        }
        cfg.validate()?;
        if cfg.api_key.as_deref().map(str::trim).unwrap_or("").is_empty() {
            return Err(LlmError::Config("openai provider requires api_key".into()));
        }

        let base = cfg.endpoint.trim_end_matches('/');
        let url_chat = format!("{base}/v1/chat/completions");
        let url_embeddings = format!("{base}/v1/embeddings");

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = cfg.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            cfg,
            url_chat,
            url_embeddings,
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.cfg.api_key.as_deref().unwrap_or(""))
    }

    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: Option<f32>,
    ) -> Result<String, LlmError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            #[serde(skip_serializing_if = "Option::is_none")]
            temperature: Option<f32>,
            #[serde(skip_serializing_if = "Option::is_none")]
            max_tokens: Option<u32>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(s) = system {
            messages.push(Msg {
                role: "system",
                content: s,
            });
        }
        messages.push(Msg {
            role: "user",
            content: prompt,
        });

        debug!(model = %self.cfg.model, prompt_len = prompt.len(), "openai generate");

        let body = Req {
            model: &self.cfg.model,
            messages,
            temperature: temperature.or(self.cfg.temperature),
            max_tokens: self.cfg.max_tokens,
        };

        let resp = self
            .http
            .post(&self.url_chat)
            .header(reqwest::header::AUTHORIZATION, self.bearer())
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
        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Decode("empty choices in chat response".into()))
    }

    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, LlmError> {
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            input: &'a str,
        }
        #[derive(Deserialize)]
        struct Item {
            embedding: Vec<f32>,
        }
        #[derive(Deserialize)]
        struct Resp {
            data: Vec<Item>,
        }

        let body = Req {
            model: &self.cfg.model,
            input,
        };
        let resp = self
            .http
            .post(&self.url_embeddings)
            .header(reqwest::header::AUTHORIZATION, self.bearer())
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
        data.data
            .into_iter()
            .next()
            .map(|i| i.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| LlmError::Decode("empty data in embeddings response".into()))
    }
}
