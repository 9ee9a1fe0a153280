//! Profile router: one handle, three logical models.
//!
//! `fast` serves classification and gap analysis, `slow` serves page
//! generation and final answers, `embedding` serves the vector store. If no
//! slow profile is supplied it falls back to fast. Underlying HTTP clients
//! are cached per config so repeated calls never rebuild connections.

use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
    sync::Arc,
    time::Instant,
};

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    config::{LlmModelConfig, LlmProvider},
    contract::{BoxFuture, EmbeddingsProvider, TextGenerator},
    errors::LlmError,
    health::{check_endpoint, HealthStatus},
    providers::{ollama::OllamaClient, openai::OpenAiClient},
};

/// Shared service managing the **fast**, **slow**, and **embedding** profiles.
pub struct LlmProfiles {
    fast: LlmModelConfig,
    slow: LlmModelConfig,
    embedding: LlmModelConfig,

    ollama: RwLock<HashMap<ClientKey, Arc<OllamaClient>>>,
    openai: RwLock<HashMap<ClientKey, Arc<OpenAiClient>>>,
}

impl LlmProfiles {
    /// Create the service. `slow_opt=None` falls back to the fast profile.
    pub fn new(
        fast: LlmModelConfig,
        slow_opt: Option<LlmModelConfig>,
        embedding: LlmModelConfig,
    ) -> Result<Self, LlmError> {
        fast.validate()?;
        embedding.validate()?;
        let slow = match slow_opt {
            Some(s) => {
                s.validate()?;
                s
            }
            None => fast.clone(),
        };

        info!(
            fast.provider = %fast.provider,
            fast.model = %fast.model,
            slow.provider = %slow.provider,
            slow.model = %slow.model,
            embedding.model = %embedding.model,
            "llm profiles initialized"
        );

        Ok(Self {
            fast,
            slow,
            embedding,
            ollama: RwLock::new(HashMap::new()),
            openai: RwLock::new(HashMap::new()),
        })
    }

    /// Generate with the fast profile.
    pub async fn generate_fast(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: Option<f32>,
    ) -> Result<String, LlmError> {
        self.generate_with(&self.fast, prompt, system, temperature)
            .await
    }

    /// Generate with the slow profile (quality tier).
    pub async fn generate_slow(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: Option<f32>,
    ) -> Result<String, LlmError> {
        self.generate_with(&self.slow, prompt, system, temperature)
            .await
    }

    /// Compute an embedding with the embedding profile.
    pub async fn embed_text(&self, input: &str) -> Result<Vec<f32>, LlmError> {
        let started = Instant::now();
        let out = match self.embedding.provider {
            LlmProvider::Ollama => {
                let cli = self.get_or_init_ollama(&self.embedding).await?;
                cli.embeddings(input).await
            }
            LlmProvider::OpenAi => {
                let cli = self.get_or_init_openai(&self.embedding).await?;
                cli.embeddings(input).await
            }
        };
        if out.is_ok() {
            debug!(
                model = %self.embedding.model,
                input_len = input.len(),
                latency_ms = started.elapsed().as_millis() as u64,
                "embedding completed"
            );
        }
        out
    }

    /// Health snapshot for all distinct profiles (duplicates checked once).
    pub async fn health_all(&self) -> Vec<HealthStatus> {
        let mut list = vec![self.fast.clone()];
        if self.slow != self.fast {
            list.push(self.slow.clone());
        }
        if self.embedding != self.fast && self.embedding != self.slow {
            list.push(self.embedding.clone());
        }
        let mut out = Vec::with_capacity(list.len());
        for cfg in &list {
            out.push(check_endpoint(cfg).await);
        }
        out
    }

    /// Current `(fast, slow, embedding)` configs.
    pub fn profiles(&self) -> (&LlmModelConfig, &LlmModelConfig, &LlmModelConfig) {
        (&self.fast, &self.slow, &self.embedding)
    }

    /// A [`TextGenerator`] view over the fast profile.
    pub fn fast_generator(self: &Arc<Self>) -> ProfileGenerator {
        ProfileGenerator {
            svc: Arc::clone(self),
            tier: Tier::Fast,
        }
    }

    /// A [`TextGenerator`] view over the slow profile.
    pub fn slow_generator(self: &Arc<Self>) -> ProfileGenerator {
        ProfileGenerator {
            svc: Arc::clone(self),
            tier: Tier::Slow,
        }
    }

    async fn generate_with(
        &self,
        cfg: &LlmModelConfig,
        prompt: &str,
        system: Option<&str>,
        temperature: Option<f32>,
    ) -> Result<String, LlmError> {
        let started = Instant::now();
        let res = match cfg.provider {
            LlmProvider::Ollama => {
                let cli = self.get_or_init_ollama(cfg).await?;
                cli.generate(prompt, system, temperature).await
            }
            LlmProvider::OpenAi => {
                let cli = self.get_or_init_openai(cfg).await?;
                cli.generate(prompt, system, temperature).await
            }
        };
        if res.is_ok() {
            info!(
                provider = %cfg.provider,
                model = %cfg.model,
                prompt_len = prompt.len(),
                latency_ms = started.elapsed().as_millis() as u64,
                "generation completed"
            );
        }
        res
    }

    async fn get_or_init_ollama(&self, cfg: &LlmModelConfig) -> Result<Arc<OllamaClient>, LlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.ollama.read().await.get(&key).cloned() {
            return Ok(cli);
        }
        let mut w = self.ollama.write().await;
        if let Some(cli) = w.get(&key).cloned() {
            return Ok(cli);
        }
        debug!(model = %cfg.model, endpoint = %cfg.endpoint, "initializing ollama client");
        let cli = Arc::new(OllamaClient::new(cfg.clone())?);
        w.insert(key, Arc::clone(&cli));
        Ok(cli)
    }

    async fn get_or_init_openai(&self, cfg: &LlmModelConfig) -> Result<Arc<OpenAiClient>, LlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.openai.read().await.get(&key).cloned() {
            return Ok(cli);
        }
        let mut w = self.openai.write().await;
        if let Some(cli) = w.get(&key).cloned() {
            return Ok(cli);
        }
        debug!(model = %cfg.model, endpoint = %cfg.endpoint, "initializing openai client");
        let cli = Arc::new(OpenAiClient::new(cfg.clone())?);
        w.insert(key, Arc::clone(&cli));
        Ok(cli)
    }
}

#[derive(Clone, Copy)]
enum Tier {
    Fast,
    Slow,
}

/// Generator view bound to one tier of an [`LlmProfiles`] handle.
pub struct ProfileGenerator {
    svc: Arc<LlmProfiles>,
    tier: Tier,
}

impl TextGenerator for ProfileGenerator {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        system: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String, LlmError>> {
        Box::pin(async move {
            match self.tier {
                Tier::Fast => self.svc.generate_fast(prompt, system, None).await,
                Tier::Slow => self.svc.generate_slow(prompt, system, None).await,
            }
        })
    }

    fn generate_with_temperature<'a>(
        &'a self,
        prompt: &'a str,
        system: Option<&'a str>,
        temperature: f32,
    ) -> BoxFuture<'a, Result<String, LlmError>> {
        Box::pin(async move {
            match self.tier {
                Tier::Fast => {
                    self.svc
                        .generate_fast(prompt, system, Some(temperature))
                        .await
                }
                Tier::Slow => {
                    self.svc
                        .generate_slow(prompt, system, Some(temperature))
                        .await
                }
            }
        })
    }
}

impl EmbeddingsProvider for LlmProfiles {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, LlmError>> {
        Box::pin(self.embed_text(text))
    }
}

/// Cache key identifying a unique client config. The api_key participates
/// so differently-credentialed clients never share a connection pool, but
/// its value is never logged.
#[derive(Clone, Eq, PartialEq)]
struct ClientKey {
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Option<u64>,
}

impl From<&LlmModelConfig> for ClientKey {
    fn from(cfg: &LlmModelConfig) -> Self {
        Self {
            provider: cfg.provider,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            timeout: cfg.timeout_secs,
        }
    }
}

impl Hash for ClientKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.provider.hash(state);
        self.endpoint.hash(state);
        self.model.hash(state);
        self.api_key.hash(state);
        self.timeout.hash(state);
    }
}
