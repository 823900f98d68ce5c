// ABOUTME: Google Gemini adapter - cloud text and vision generation via the generateContent REST API.
// ABOUTME: Highest-priority provider in the fallback chain; the only backend with vision capability.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::http;
use crate::traits::Provider;

/// Default Gemini API base URL.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Cloud provider backed by Google's generative language API.
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(GEMINI_API_BASE_URL, api_key, model)
    }

    /// Point the adapter at a different endpoint (used by tests).
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// The key travels in the `x-goog-api-key` header, never in the URL:
    /// transport errors echo the URL and would leak it into logs.
    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn generate_content(&self, parts: Value) -> Result<String, ProviderError> {
        let body = json!({ "contents": [{ "parts": parts }] });
        let resp = http::post_json(
            &self.client,
            &self.endpoint(),
            &[("x-goog-api-key", self.api_key.as_str())],
            &body,
            GENERATION_TIMEOUT,
        )
        .await?;
        extract_text(&resp)
    }
}

/// Pull the concatenated text parts out of the first candidate.
fn extract_text(body: &Value) -> Result<String, ProviderError> {
    let text: String = body["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::Api(
            "no text candidate in Gemini response".to_string(),
        ));
    }
    Ok(text)
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn supports_vision(&self) -> bool {
        true
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.generate_content(json!([{ "text": prompt }])).await
    }

    async fn generate_from_image(
        &self,
        prompt: &str,
        image: &[u8],
    ) -> Result<String, ProviderError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        self.generate_content(json!([
            { "text": prompt },
            { "inline_data": { "mime_type": "image/jpeg", "data": encoded } }
        ]))
        .await
    }
}
