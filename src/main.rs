//! Chained Select Server
//!
//! Main entry point for the lookup HTTP service.
//!
//! Reads config from env vars:
//!   CHAINED_SELECT_CONFIG — YAML config path (default: config/lookup.yaml)
//!   CHAINED_SELECT_ADDR   — listen address, overrides `server.bind_addr`
//!   DATABASE_URL          — Postgres URL (postgres backend; name set by
//!                           `store.connection_string_env`)

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chained_select::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use chained_select::{
    build_router, AppState, LookupConfig, MemoryStore, RecordStore, Registry, StoreBackend,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chained_select=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting chained select server");

    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    tracing::info!(path = %config_path, "Loading configuration");

    let mut config = LookupConfig::from_file(&config_path)?;
    config.apply_env_overrides();

    let registry = Arc::new(Registry::from_config(&config.entities)?);
    tracing::info!(
        types = registry.len(),
        chains = registry.chains().len(),
        "Registry built"
    );

    let store = open_store(&config, &registry).await?;
    let app = build_router(AppState::new(registry, store));

    let addr = config.server.bind_addr.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!(%addr, "Lookup server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn open_store(
    config: &LookupConfig,
    registry: &Registry,
) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            let path = config
                .store
                .fixtures
                .as_deref()
                .context("store.fixtures is required for the memory backend")?;
            let store = MemoryStore::from_fixture_file(registry, path)?;
            tracing::info!(records = store.len(), path, "Fixtures loaded");
            Ok(Arc::new(store))
        }
        StoreBackend::Postgres => open_postgres(config).await,
    }
}

#[cfg(feature = "database")]
async fn open_postgres(config: &LookupConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    let env = &config.store.connection_string_env;
    let database_url =
        std::env::var(env).with_context(|| format!("{env} must be set for the postgres backend"))?;

    let store = chained_select::store::PgStore::connect(&database_url).await?;
    tracing::info!("Database connection established");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "database"))]
async fn open_postgres(_config: &LookupConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    anyhow::bail!("the postgres backend requires building with the `database` feature")
}
