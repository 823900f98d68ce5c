// ABOUTME: Mock provider for testing - scripted successes and failures with call counting.
// ABOUTME: Lets router and pipeline tests assert fallback order without touching the network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::traits::Provider;

enum Behavior {
    Succeed(String),
    Fail,
    TimeOut,
}

/// Deterministic provider for tests. Records every prompt it was handed
/// and counts calls so tests can assert first-success short-circuiting.
pub struct MockProvider {
    name: String,
    behavior: Behavior,
    vision: bool,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockProvider {
    /// A provider that always answers with `reply`.
    pub fn succeeding(name: &str, reply: &str) -> Self {
        Self::build(name, Behavior::Succeed(reply.to_string()))
    }

    /// A provider that always fails with an API error.
    pub fn failing(name: &str) -> Self {
        Self::build(name, Behavior::Fail)
    }

    /// A provider that always fails with a timeout error.
    pub fn timing_out(name: &str) -> Self {
        Self::build(name, Behavior::TimeOut)
    }

    /// Mark this mock as vision-capable.
    pub fn with_vision(mut self) -> Self {
        self.vision = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn build(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            vision: false,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn answer(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        match &self.behavior {
            Behavior::Succeed(reply) => Ok(reply.clone()),
            Behavior::Fail => Err(ProviderError::Api("mock failure".to_string())),
            Behavior::TimeOut => Err(ProviderError::Timeout(Duration::from_millis(1))),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_vision(&self) -> bool {
        self.vision
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.answer(prompt)
    }

    async fn generate_from_image(
        &self,
        prompt: &str,
        _image: &[u8],
    ) -> Result<String, ProviderError> {
        if !self.vision {
            return Err(ProviderError::Unsupported("vision"));
        }
        self.answer(prompt)
    }
}
