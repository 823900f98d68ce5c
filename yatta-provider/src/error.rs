// ABOUTME: Typed error taxonomy for provider calls.
// ABOUTME: Every variant is recoverable from the router's point of view: it moves on to the next provider.

use std::time::Duration;
use thiserror::Error;

/// Errors a provider call can produce. Adapters never swallow these;
/// fallback is the router's decision alone.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The call exceeded its deadline and was aborted
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint answered with a non-2xx status
    #[error("provider returned HTTP {status}")]
    Http { status: u16 },

    /// Transport failure or a response that doesn't match the expected shape
    #[error("provider API error: {0}")]
    Api(String),

    /// Capability not offered by this provider (e.g. vision on a text-only model)
    #[error("provider does not support {0}")]
    Unsupported(&'static str),
}
