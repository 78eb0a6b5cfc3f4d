mod aggregator;
mod cache;
mod client;
mod config;
mod error;
mod models;
mod poster;
mod registry;
mod routes;

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    aggregator::Aggregator,
    cache::{CacheStore, MemoryCache},
    client::{HttpProviderClient, MovieCatalog},
    config::Config,
    poster::{HttpPosterResolver, PosterResolver},
    registry::ProviderRegistry,
};

pub struct AppState {
    pub aggregator: Arc<Aggregator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,filmprice=debug".to_string()),
        )
        .init();

    let config = Config::from_env()?;

    if config.provider_config_url.is_none() && config.provider_api_token.trim().is_empty() {
        tracing::warn!("no PROVIDER_API_TOKEN set - built-in providers will reject requests");
    }

    let http = reqwest::Client::builder()
        .user_agent("filmprice/0.1")
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;

    let result_cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());

    let registry = Arc::new(ProviderRegistry::new(
        http.clone(),
        Arc::clone(&result_cache),
        config.provider_config_url.clone(),
        config.provider_api_token.clone(),
        Duration::from_secs(config.provider_ttl_secs),
    ));

    let catalog: Arc<dyn MovieCatalog> =
        Arc::new(HttpProviderClient::new(http.clone(), Arc::clone(&registry)));

    let posters: Arc<dyn PosterResolver> = Arc::new(HttpPosterResolver::new(
        http.clone(),
        Duration::from_millis(config.poster_probe_timeout_ms),
    ));

    let aggregator = Arc::new(Aggregator::new(
        registry,
        catalog,
        result_cache,
        posters,
        Duration::from_secs(config.result_ttl_secs),
        Duration::from_secs(config.result_idle_secs),
        config.poster_concurrency,
    ));

    let state = Arc::new(AppState { aggregator });

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/api/movies", get(routes::list_movies))
        .route("/api/movies/{id}", get(routes::movie_detail))
        .route("/api/refresh", post(routes::refresh))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
