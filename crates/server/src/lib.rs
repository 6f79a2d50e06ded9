//! YapGPT Server Library
//!
//! GraphQL backend for Yapper profiles, AI conversation practice and the
//! streaming chat/voice relay.

pub mod auth;
pub mod characters;
pub mod config;
pub mod error;
pub mod graphql;
pub mod models;
pub mod relay;
pub mod store;
pub mod vendors;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use auth::AuthManager;
use config::{AppState, ServerConfig};
use relay::StreamingRelay;
use store::ProfileStore;
use vendors::Vendors;

/// Wire every service together from config and the given vendor adapters
pub async fn build_state(config: ServerConfig, vendors: Vendors) -> anyhow::Result<AppState> {
    let profiles = Arc::new(ProfileStore::connect(&config.database_url()).await?);
    info!("Profile store initialized");

    let auth = Arc::new(AuthManager::new(&config.jwt_secret, config.bcrypt_cost));
    info!("Auth Manager initialized");

    let relay = Arc::new(StreamingRelay::new(
        vendors.chat.clone(),
        vendors.speech.clone(),
        config.relay_capacity,
    ));
    info!("Streaming relay initialized");

    Ok(AppState {
        config: Arc::new(config),
        profiles,
        auth,
        relay,
        vendors,
    })
}

/// Full HTTP surface: GraphQL, websocket subscriptions and the health check
pub fn app(state: AppState) -> Router {
    let auth = state.auth.clone();
    let schema = graphql::build_schema(state);

    graphql::router(schema, auth)
        .route("/health", get(health_check))
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        // Already set, ignore
    }

    info!("=== YapGPT Server ===");

    let config = ServerConfig::from_env()?;
    if config.database_url.is_none() {
        config.ensure_dirs().await?;
    }
    info!("Data directory: {:?}", config.data_dir);

    let vendors = Vendors::from_config(&config);
    let port = config.port;
    let state = build_state(config, vendors).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("GraphQL endpoint: http://localhost:{}/graphql", port);
    info!("Subscriptions:    ws://localhost:{}/ws", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK - YapGPT Server"
}
