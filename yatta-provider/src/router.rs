// ABOUTME: Ordered first-success fallback across AI providers.
// ABOUTME: Never fails - total exhaustion degrades to a fixed apology message instead of an error.

use std::sync::Arc;

use crate::traits::Provider;

/// Reply used when every provider in the chain has failed. The caller sits
/// on a live message-delivery path and must always have something to send.
pub const DEGRADED_REPLY: &str = "AI sedang istirahat sebentar ☕, coba lagi nanti ya.";

/// Tries providers in priority order and returns the first success.
///
/// Cloud text/vision first, then local models by preference. There is no
/// quality comparison across providers; the first answer wins.
pub struct FallbackRouter {
    providers: Vec<Arc<dyn Provider>>,
}

impl FallbackRouter {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self { providers }
    }

    /// Route a text prompt. Always returns a reply.
    pub async fn route(&self, prompt: &str) -> String {
        for provider in &self.providers {
            match provider.generate(prompt).await {
                Ok(text) => {
                    tracing::info!(provider = provider.name(), "Provider answered");
                    return text;
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        "Provider failed, trying next"
                    );
                }
            }
        }

        tracing::error!("All providers exhausted, sending degraded reply");
        DEGRADED_REPLY.to_string()
    }

    /// Route a prompt with image bytes. Providers without vision capability
    /// are skipped outright rather than being handed a dropped image.
    pub async fn route_vision(&self, prompt: &str, image: &[u8]) -> String {
        for provider in self.providers.iter().filter(|p| p.supports_vision()) {
            match provider.generate_from_image(prompt, image).await {
                Ok(text) => {
                    tracing::info!(provider = provider.name(), "Provider answered (vision)");
                    return text;
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        "Vision provider failed, trying next"
                    );
                }
            }
        }

        tracing::error!("All vision providers exhausted, sending degraded reply");
        DEGRADED_REPLY.to_string()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}
