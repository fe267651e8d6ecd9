use std::sync::Arc;

use anyhow::Context;

use simple_bank::config::{AppConfig, StorageBackend};
use simple_bank::db::Database;
use simple_bank::gateway::{self, state::AppState};
use simple_bank::ledger::Ledger;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    let _log_guard = simple_bank::logging::init_logging(&app_config);

    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }

    tracing::info!("Starting Simple Bank in {} mode", env);

    // Storage: explicit handle created here, closed on shutdown
    let storage = &app_config.storage;
    let (ledger, db) = match storage.backend {
        StorageBackend::Postgres => {
            let url = storage
                .postgres_url
                .as_deref()
                .context("postgres_url not configured")?;
            let db = Database::connect(url, storage.max_connections, storage.acquire_timeout())
                .await
                .context("Failed to connect to PostgreSQL")?;
            db.init_schema()
                .await
                .context("Failed to initialize schema")?;
            (Ledger::postgres(&db), Some(db))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on exit");
            (Ledger::memory(), None)
        }
    };
    tracing::info!(backend = ledger.backend(), "Ledger ready");

    let state = Arc::new(AppState::new(
        ledger,
        app_config.auth.jwt_secret.clone(),
        app_config.auth.token_ttl_hours,
        app_config.transfer.timeout(),
    ));

    let served = gateway::run_server(&app_config.gateway, state).await;

    if let Some(db) = db {
        db.close().await;
    }
    served
}
