//! Reachability probes for configured model endpoints.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::config::{LlmModelConfig, LlmProvider};

/// Outcome of probing one profile endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub provider: LlmProvider,
    pub model: String,
    pub endpoint: String,
    pub reachable: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Probe an endpoint with a short GET against its version/models route.
pub async fn check_endpoint(cfg: &LlmModelConfig) -> HealthStatus {
    let base = cfg.endpoint.trim_end_matches('/');
    let url = match cfg.provider {
        LlmProvider::Ollama => format!("{base}/api/version"),
        LlmProvider::OpenAi => format!("{base}/v1/models"),
    };

    let started = Instant::now();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs.unwrap_or(5).min(10)))
        .build();

    let result = match client {
        Ok(http) => {
            let mut req = http.get(&url);
            if let (LlmProvider::OpenAi, Some(key)) = (cfg.provider, cfg.api_key.as_deref()) {
                req = req.bearer_auth(key);
            }
            match req.send().await {
                Ok(resp) if resp.status().is_success() => Ok(()),
                Ok(resp) => Err(format!("status {}", resp.status())),
                Err(e) => Err(e.to_string()),
            }
        }
        Err(e) => Err(e.to_string()),
    };

    let latency_ms = started.elapsed().as_millis() as u64;
    debug!(endpoint = %cfg.endpoint, ok = result.is_ok(), latency_ms, "health probe");

    HealthStatus {
        provider: cfg.provider,
        model: cfg.model.clone(),
        endpoint: cfg.endpoint.clone(),
        reachable: result.is_ok(),
        latency_ms,
        error: result.err(),
    }
}
