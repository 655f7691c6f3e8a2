use std::sync::Arc;

use anyhow::Context;
use hrms_tenancy::config::{config, StorageBackend};
use hrms_tenancy::database::PgConnector;
use hrms_tenancy::services::LogNotifier;
use hrms_tenancy::{app, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, TENANCY_BASE_DOMAIN, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config().clone();
    tracing::info!("Starting HRMS in {:?} mode with {:?} storage", config.environment, config.database.backend);

    let state = match config.database.backend {
        StorageBackend::Memory => AppState::in_memory(config.clone()),
        StorageBackend::Postgres => {
            let connector = PgConnector::new(&config.database)
                .await
                .context("failed to reach the database server")?;
            let central = connector
                .open_central(&config.database.central_database)
                .await
                .context("failed to open the central database")?;
            AppState::new(config.clone(), Arc::new(central), Arc::new(connector), Arc::new(LogNotifier))
        }
    };

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!(
        "HRMS listening on http://{} (central: {}, tenants: *.{})",
        bind_addr,
        config.tenancy.primary_central_domain(),
        config.tenancy.base_domain
    );

    let db = state.database().clone();
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server error")?;

    db.close_all().await;
    Ok(())
}
