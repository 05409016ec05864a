//! DayMind HTTP server entry point.
//!
//! Loads configuration, wires the store, provider client and speech engines
//! together, and serves the JSON API.

use std::sync::Arc;

use tracing::{info, warn};

use daymind::assistant::Assistant;
use daymind::config::DaymindConfig;
use daymind::llm::ProviderClient;
use daymind::store::{JsonFileStore, Store};
use daymind::stt::create_stt_engine;
use daymind::tts::SpeechSynthesizer;
use daymind::{logger, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DaymindConfig::load();
    std::fs::create_dir_all(&config.data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", config.data_dir.display(), e))?;
    logger::init(&config.data_dir)?;
    for warning in &config.load_warnings {
        warn!("{}", warning);
    }

    info!(
        data_dir = %config.data_dir.display(),
        provider = %config.ai_provider,
        stt = %config.stt.adapter,
        "Configuration loaded"
    );

    let store: Arc<dyn Store> = Arc::new(JsonFileStore::open(
        config.memory_path(),
        config.tasks_path(),
        config.journal_path(),
    ));
    let llm = ProviderClient::from_config(&config, store.clone())?;
    let tts = SpeechSynthesizer::from_config(&config)?;

    // Voice input is optional; everything else works without it.
    let stt = match create_stt_engine(&config).await {
        Ok(adapter) => Some(adapter),
        Err(e) => {
            warn!("Speech recognition unavailable: {}", e);
            None
        }
    };

    let assistant = Assistant::new(store, llm, tts, stt, config.data_dir.clone());
    let addr = format!("{}:{}", config.host, config.port);
    server::serve(Arc::new(assistant), &addr).await
}
