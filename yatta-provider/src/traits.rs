// ABOUTME: Core Provider trait that all AI backends implement.
// ABOUTME: Text generation plus optional vision capability, with typed errors for the router.

use async_trait::async_trait;

use crate::error::ProviderError;

/// An interchangeable AI generation backend.
///
/// Implementations must propagate failures as [`ProviderError`] rather than
/// degrading internally; the fallback router owns the retry decision.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name for logging (includes the model for multi-model backends)
    fn name(&self) -> &str;

    /// Whether [`Provider::generate_from_image`] is implemented
    fn supports_vision(&self) -> bool {
        false
    }

    /// Generate a text reply for a text prompt
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Generate a text reply for a prompt plus raw image bytes
    async fn generate_from_image(
        &self,
        _prompt: &str,
        _image: &[u8],
    ) -> Result<String, ProviderError> {
        Err(ProviderError::Unsupported("vision"))
    }
}
