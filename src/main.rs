// ABOUTME: Main entry point for the yatta WhatsApp AI relay bot.
// ABOUTME: Initializes logging, config, transcript store, providers, and the supervised session loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yatta::config::Config;
use yatta::gateway::GatewayConnector;
use yatta::pipeline::Pipeline;
use yatta::session::{CredentialStore, SessionSupervisor};
use yatta::transcript::TranscriptStore;
use yatta::trigger::Trigger;
use yatta_provider::{
    gemini::GeminiProvider,
    ollama::{self, OllamaProvider},
    FallbackRouter, Provider,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Set up panic hook to log panics before they crash the process
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\n╔══════════════════════════════════════════════════════════╗");
        eprintln!("║ PANIC! Bot crashed with the following error:            ║");
        eprintln!("╚══════════════════════════════════════════════════════════╝\n");
        eprintln!("{}", panic_info);
        eprintln!("\nBacktrace:");
        eprintln!("{:?}", std::backtrace::Backtrace::force_capture());
    }));

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting yatta");

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!(
        gateway = %config.gateway.addr,
        gemini_model = %config.gemini.model,
        ollama_models = config.ollama.models.len(),
        trigger = %config.trigger.word,
        db = %config.transcript.db_path,
        "Configuration loaded"
    );

    let transcript = TranscriptStore::open(&config.transcript.db_path)
        .context("Failed to open transcript store")?;
    let trigger = Trigger::new(&config.trigger.word)?;

    // Provider chain: Gemini first, then each local model in order
    let mut providers: Vec<Arc<dyn Provider>> = vec![Arc::new(GeminiProvider::new(
        &config.gemini.api_key,
        &config.gemini.model,
    ))];
    for model in &config.ollama.models {
        providers.push(Arc::new(OllamaProvider::new(&config.ollama.base_url, model)));
    }
    let router = FallbackRouter::new(providers);
    tracing::info!(providers = router.provider_count(), "Provider chain ready");

    probe_local_models(&config).await;

    let pipeline = Arc::new(Pipeline::new(router, trigger, transcript));
    let connector = GatewayConnector::new(&config.gateway.addr);
    let supervisor = SessionSupervisor::new(
        connector,
        CredentialStore::new(&config.session.auth_dir),
        config.reconnect_policy(),
    );

    supervisor.run(pipeline).await
}

/// Startup probe of the local fallback tier. Purely informational: a dead
/// Ollama daemon still leaves Gemini in the chain.
async fn probe_local_models(config: &Config) {
    match ollama::available_models(&config.ollama.base_url).await {
        Ok(models) => {
            tracing::info!(models = ?models, "Local models available");
            if let Some(first) = config.ollama.models.first() {
                let provider = OllamaProvider::new(&config.ollama.base_url, first);
                if let Err(e) = provider.warm_up().await {
                    tracing::warn!(model = %first, error = %e, "Local model warm-up failed");
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Ollama unreachable; local fallback tier is offline");
        }
    }
}
