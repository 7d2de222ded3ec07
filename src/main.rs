use std::sync::Arc;

use healthbridge::api::start_api_server;
use healthbridge::config::{self, EngineConfig, HistoryBackend, ServerConfig};
use healthbridge::db::SqliteHistoryStore;
use healthbridge::triage::{HistoryStore, InMemoryHistoryStore, TracingDispatcher, TriageEngine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    healthbridge::init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let server_config = ServerConfig::from_env()?;
    let engine_config = EngineConfig::from_env()?;

    let store: Arc<dyn HistoryStore> = match &server_config.history {
        HistoryBackend::Memory => {
            tracing::warn!("History is kept in memory and will not survive a restart");
            Arc::new(InMemoryHistoryStore::new())
        }
        HistoryBackend::Sqlite(path) => Arc::new(SqliteHistoryStore::open(path)?),
    };

    let engine = TriageEngine::from_config(&engine_config, store, Arc::new(TracingDispatcher))?;
    let server = start_api_server(Arc::new(engine), server_config.bind).await?;
    tracing::info!(addr = %server.session.server_addr, "Listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, shutting down");
    server.stop().await;

    Ok(())
}
