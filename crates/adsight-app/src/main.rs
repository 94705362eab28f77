//! adsight application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Open the SQLite conversation store
//! 3. Build the inference and warehouse clients
//! 4. Wire the turn orchestrator onto a bounded worker pool
//! 5. Start the axum API server

mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use adsight_api::auth::resolve_tokens;
use adsight_api::state::AppState;
use adsight_backends::{MessagesClient, WarehouseClient};
use adsight_chat::{TurnDispatcher, TurnOrchestrator};
use adsight_core::config::{expand_home, AppConfig};
use adsight_storage::{Database, SqliteConversationStore, SqliteMessageStore};

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = AppConfig::load_or_default(&config_file);
    config.apply_env_overrides();
    config.server.port = args.resolve_port(config.server.port);
    if let Some(path) = args.resolve_database() {
        config.storage.database_path = path;
    }
    config.server.log_level = args.resolve_log_level(&config.server.log_level);

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .init();

    tracing::info!("Starting adsight v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");
    config.validate()?;

    if config.inference.api_key.is_empty() {
        tracing::warn!("No inference API key configured; chat turns will fail");
    }

    // Storage.
    let db_path = expand_home(&config.storage.database_path);
    let db = Arc::new(Database::new(&db_path)?);
    let conversations = Arc::new(SqliteConversationStore::new(Arc::clone(&db)));
    let messages = Arc::new(SqliteMessageStore::new(db));

    // Backends.
    let completion = Arc::new(MessagesClient::new(&config.inference)?);
    let warehouse = Arc::new(WarehouseClient::new(&config.warehouse)?);
    tracing::info!(
        model = %config.inference.model,
        warehouse = %config.warehouse.base_url,
        tables = config.warehouse.tables.len(),
        "Backends ready"
    );

    // Turn pipeline.
    let orchestrator =
        TurnOrchestrator::from_config(&config, conversations, messages, completion, warehouse);
    let dispatcher = TurnDispatcher::new(
        Arc::new(orchestrator),
        config.server.worker_pool_size,
        Duration::from_secs(config.server.stream_timeout_secs),
    );
    tracing::info!(
        workers = config.server.worker_pool_size,
        turn_timeout_secs = config.server.stream_timeout_secs,
        "Turn dispatcher ready"
    );

    // Auth.
    let token_path = expand_home(&config.auth.token_file);
    let tokens = resolve_tokens(&config.auth, &token_path);
    tracing::info!(callers = tokens.len(), "Bearer tokens loaded");

    // === API server ===
    let state = AppState::new(&config, dispatcher, tokens);
    adsight_api::start_server(&config.server, state).await?;

    Ok(())
}
