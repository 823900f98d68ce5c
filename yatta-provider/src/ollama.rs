// ABOUTME: Ollama adapter - local text generation against the /api/generate endpoint.
// ABOUTME: Also carries the startup availability check and warm-up call made before the router relies on it.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::http;
use crate::traits::Provider;

/// Default Ollama API base URL (local server).
pub const OLLAMA_API_BASE_URL: &str = "http://127.0.0.1:11434";

const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Local text-only provider. One instance per model; list them in
/// preference order when building the fallback chain.
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    name: String,
}

impl std::fmt::Debug for OllamaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let model = model.into();
        let name = format!("ollama/{}", model);
        Self {
            client: reqwest::Client::new(),
            base_url,
            model,
            name,
        }
    }

    /// One throwaway generation to load the model into server memory.
    /// Cuts first-request latency; failure only means a cold first call.
    pub async fn warm_up(&self) -> Result<(), ProviderError> {
        self.generate("ping").await.map(|_| ())
    }
}

/// Query the availability endpoint and return the model identifiers the
/// server reports. Bounded by the short health-check budget.
pub async fn available_models(base_url: &str) -> Result<Vec<String>, ProviderError> {
    let client = reqwest::Client::new();
    let url = format!("{}/api/tags", base_url);
    let resp = http::get_json(&client, &url, HEALTH_TIMEOUT).await?;
    Ok(parse_model_names(&resp))
}

fn parse_model_names(body: &Value) -> Vec<String> {
    body["models"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|m| m["name"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        let resp = http::post_json(&self.client, &url, &[], &body, GENERATION_TIMEOUT).await?;

        resp["response"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| ProviderError::Api("no response field in Ollama reply".to_string()))
    }
}
