use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use jsonwebtoken::DecodingKey;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use movie_suggest_api::api::{create_router, AppState};
use movie_suggest_api::cache::TtlCache;
use movie_suggest_api::catalog::{MovieCatalog, TmdbCatalog};
use movie_suggest_api::config::Config;
use movie_suggest_api::db::{PgRatingStore, RatingStore};
use movie_suggest_api::model::{ModelGateway, ModelStore, ProfileGateway};
use movie_suggest_api::services::{
    EventIngestor, KafkaEventConsumer, RefreshScheduler, SuggestionService, TrainingQueue,
    TrainingWorker, UserContextService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    let store: Arc<dyn RatingStore> = Arc::new(PgRatingStore::new(pool));

    let catalog: Arc<dyn MovieCatalog> = Arc::new(TmdbCatalog::new(
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
    ));

    let models = ModelStore::new(&config.models_dir)?;
    let gateway: Arc<dyn ModelGateway> = Arc::new(ProfileGateway::new());

    let context_cache = TtlCache::new(Duration::from_secs(config.user_context_ttl_secs));
    let suggestion_cache = TtlCache::new(Duration::from_secs(config.suggestions_ttl_secs));

    let user_context = Arc::new(UserContextService::new(
        Arc::clone(&store),
        Arc::clone(&catalog),
        context_cache.clone(),
    ));

    let suggestions = Arc::new(SuggestionService::new(
        Arc::clone(&store),
        Arc::clone(&catalog),
        Arc::clone(&gateway),
        models.clone(),
        Arc::clone(&user_context),
        suggestion_cache.clone(),
        config.fetch_concurrency,
    ));

    let (queue, queue_rx) = TrainingQueue::new();
    let worker_handle = TrainingWorker::new(
        Arc::clone(&store),
        Arc::clone(&catalog),
        gateway,
        models.clone(),
        user_context,
        Arc::clone(&suggestions),
        context_cache.clone(),
        suggestion_cache.clone(),
    )
    .spawn(queue_rx);

    let ingestor = Arc::new(EventIngestor::new(context_cache, suggestion_cache, queue));
    let consumer_handle = KafkaEventConsumer::new(
        &config.kafka_bootstrap_servers,
        &config.kafka_group_id,
        &config.kafka_topic,
        ingestor,
    )?
    .spawn();

    // The scheduler runs its startup sweep inside its own task; serving
    // must not wait for it.
    let scheduler_handle = RefreshScheduler::new(
        models,
        Arc::clone(&suggestions),
        config.refresh_hour,
    )
    .spawn();

    let decoding_key = DecodingKey::from_base64_secret(&config.jwt_secret)
        .context("JWT secret is not valid base64")?;
    let state = AppState::new(suggestions, decoding_key);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, shutting down background tasks");
    consumer_handle.stop().await;
    worker_handle.stop().await;
    scheduler_handle.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
