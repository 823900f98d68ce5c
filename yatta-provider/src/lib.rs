// ABOUTME: Pluggable AI provider abstraction for yatta.
// ABOUTME: Timeout-bounded HTTP, Gemini/Ollama adapters, and the first-success fallback router.

pub mod error;
pub mod gemini;
pub mod http;
pub mod mock;
pub mod ollama;
pub mod router;
mod traits;

pub use error::ProviderError;
pub use router::{FallbackRouter, DEGRADED_REPLY};
pub use traits::Provider;
