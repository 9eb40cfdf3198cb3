pub mod api;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod store;
pub mod taxonomy;

use crate::api::{AppState, SimulatedResource};
use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::config::Settings;
use crate::store::connect_store;
use crate::taxonomy::ErrorTaxonomy;
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

/// Initialize the breaker server
pub async fn init_server(settings: Settings) -> anyhow::Result<()> {
    settings.validate()?;

    info!("Starting tripwire");
    info!(
        "Server listening on {}:{}",
        settings.server.host, settings.server.port
    );

    let store = connect_store(&settings.store)
        .await
        .context("Failed to connect failure counter store")?;

    let registry = CircuitBreakerRegistry::from_configs(
        &settings.breakers,
        store,
        Arc::new(ErrorTaxonomy::standard()),
    )?;
    info!("Loaded {} circuit breakers", settings.breakers.len());

    let state = AppState::new(registry, SimulatedResource::new(&settings.resource));
    let app = api::router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Ready to accept connections");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripwire=debug,tower_http=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();
}
