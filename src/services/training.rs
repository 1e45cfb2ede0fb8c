use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::cache::TtlCache;
use crate::catalog::MovieCatalog;
use crate::db::RatingStore;
use crate::error::AppResult;
use crate::model::{ModelGateway, ModelStore};
use crate::models::{MovieEvent, RankedSuggestion, TrainingExample, UserContext};
use crate::services::preprocess::preprocess_movie;
use crate::services::suggestions::SuggestionService;
use crate::services::user_context::UserContextService;

const IDLE_TICK: Duration = Duration::from_secs(60);

/// FIFO queue of training requests
///
/// Enqueue never blocks; the single worker consumes jobs strictly in
/// arrival order.
#[derive(Clone)]
pub struct TrainingQueue {
    tx: mpsc::UnboundedSender<MovieEvent>,
}

impl TrainingQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MovieEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues a training job for the event's user; returns immediately
    pub fn enqueue(&self, event: MovieEvent) {
        tracing::info!(user_id = %event.user_id, "Queuing training request");
        if self.tx.send(event).is_err() {
            tracing::error!("Training queue is closed, dropping job");
        }
    }
}

/// The single training worker
///
/// Exactly one job runs at a time process-wide: training is resource-heavy,
/// so concurrency stays bounded to one at the cost of head-of-line latency
/// for unrelated users.
pub struct TrainingWorker {
    store: Arc<dyn RatingStore>,
    catalog: Arc<dyn MovieCatalog>,
    gateway: Arc<dyn ModelGateway>,
    models: ModelStore,
    user_context: Arc<UserContextService>,
    suggestions: Arc<SuggestionService>,
    context_cache: TtlCache<UserContext>,
    suggestion_cache: TtlCache<Vec<RankedSuggestion>>,
}

/// Handle for stopping the training worker
pub struct WorkerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signals shutdown and waits for the worker to finish its current job
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "Training worker join failed");
        }
    }
}

impl TrainingWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn RatingStore>,
        catalog: Arc<dyn MovieCatalog>,
        gateway: Arc<dyn ModelGateway>,
        models: ModelStore,
        user_context: Arc<UserContextService>,
        suggestions: Arc<SuggestionService>,
        context_cache: TtlCache<UserContext>,
        suggestion_cache: TtlCache<Vec<RankedSuggestion>>,
    ) -> Self {
        Self {
            store,
            catalog,
            gateway,
            models,
            user_context,
            suggestions,
            context_cache,
            suggestion_cache,
        }
    }

    /// Starts the worker task consuming from `rx`
    pub fn spawn(self, rx: mpsc::UnboundedReceiver<MovieEvent>) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(rx, shutdown_rx));
        WorkerHandle { shutdown_tx, join }
    }

    async fn run(
        self,
        mut rx: mpsc::UnboundedReceiver<MovieEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        tracing::info!("Training worker started");

        loop {
            tokio::select! {
                job = rx.recv() => match job {
                    Some(event) => self.execute(event).await,
                    // All producers dropped
                    None => break,
                },
                _ = shutdown_rx.changed() => {
                    tracing::info!("Training worker shutting down");
                    break;
                }
                // Periodic wakeup while idle keeps the loop observable
                _ = tokio::time::sleep(IDLE_TICK) => {
                    tracing::trace!("Training worker idle");
                }
            }
        }

        tracing::info!("Training worker stopped");
    }

    /// Runs one training job end to end; failures are logged and must not
    /// take down the loop
    async fn execute(&self, event: MovieEvent) {
        let user_id = event.user_id.clone();
        tracing::info!(user_id = %user_id, event_type = ?event.event_type, "Starting training");

        // Re-invalidate both caches; the ingestor already did, but a
        // request may have repopulated them from pre-training state while
        // this job sat in the queue.
        self.context_cache.invalidate(&user_id).await;
        self.suggestion_cache.invalidate(&user_id).await;

        match self.train_user(&user_id).await {
            Ok(example_count) => {
                tracing::info!(
                    user_id = %user_id,
                    examples = example_count,
                    "Training completed successfully"
                );

                // Warm the suggestion cache right away instead of leaving
                // the first request after training to pay for it
                let suggestions = self.suggestions.compute(&user_id).await;
                self.suggestions.cache_suggestions(&user_id, suggestions).await;
            }
            Err(e) => {
                // No retry: the next event for this user re-triggers
                tracing::error!(user_id = %user_id, error = %e, "Training failed");
            }
        }
    }

    async fn train_user(&self, user_id: &str) -> AppResult<usize> {
        // Rebuilds from storage since the cache was just invalidated, and
        // leaves the fresh vocabulary cached for the model that is about
        // to be trained against it
        let context = self.user_context.resolve(user_id).await?;

        let (movie_ids, ratings) = self.store.movie_ids_and_ratings(user_id).await?;

        let mut examples = Vec::with_capacity(movie_ids.len());
        for (movie_id, rating) in movie_ids.into_iter().zip(ratings) {
            match self.catalog.fetch_movie_details(movie_id).await {
                Some(details) => examples.push(TrainingExample {
                    features: preprocess_movie(&details, &context),
                    rating,
                }),
                None => {
                    tracing::warn!(
                        user_id = %user_id,
                        movie_id,
                        "Skipping training example with unavailable metadata"
                    );
                }
            }
        }

        let artifact = self.gateway.train(&examples).await?;
        self.models.save(user_id, &artifact).await?;

        Ok(examples.len())
    }
}
