use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::model::ModelStore;
use crate::services::suggestions::SuggestionService;

/// Shutdown responsiveness bound for the long overnight sleep
const MAX_SLEEP_SLICE: Duration = Duration::from_secs(60);

/// Daily sweep that recomputes suggestions for every trained user
///
/// Runs once at startup and then every day at the configured UTC hour.
/// Each user is refreshed sequentially; a failed user is logged and the
/// sweep moves on.
pub struct RefreshScheduler {
    models: ModelStore,
    suggestions: Arc<SuggestionService>,
    refresh_hour: u32,
}

/// Handle for stopping the scheduler loop
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "Refresh scheduler join failed");
        }
    }
}

impl RefreshScheduler {
    pub fn new(models: ModelStore, suggestions: Arc<SuggestionService>, refresh_hour: u32) -> Self {
        Self {
            models,
            suggestions,
            refresh_hour: refresh_hour.min(23),
        }
    }

    /// Recomputes and re-caches suggestions for every user with a model
    pub async fn refresh_all(&self) {
        let user_ids = self.models.list_trained_user_ids();
        tracing::info!(users = user_ids.len(), "Starting suggestion refresh sweep");

        for user_id in &user_ids {
            // compute() absorbs failures into an empty list, which still
            // replaces whatever stale entry the cache held
            let suggestions = self.suggestions.compute(user_id).await;
            self.suggestions.cache_suggestions(user_id, suggestions).await;
        }

        tracing::info!(users = user_ids.len(), "Suggestion refresh sweep complete");
    }

    /// Starts the scheduler task: one immediate sweep, then daily runs
    ///
    /// The startup sweep happens inside the spawned task so callers are
    /// never blocked behind it.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!(refresh_hour = self.refresh_hour, "Refresh scheduler started");

        tracing::info!("Running initial suggestions refresh on startup");
        self.refresh_all().await;

        loop {
            let wait = duration_until_next(Utc::now(), self.refresh_hour);
            tracing::info!(seconds = wait.as_secs(), "Next suggestion refresh scheduled");

            let deadline = tokio::time::Instant::now() + wait;
            loop {
                let now = tokio::time::Instant::now();
                if now >= deadline {
                    break;
                }
                let slice = std::cmp::min(deadline - now, MAX_SLEEP_SLICE);
                tokio::select! {
                    _ = tokio::time::sleep(slice) => {}
                    _ = shutdown_rx.changed() => {
                        tracing::info!("Refresh scheduler shutting down");
                        return;
                    }
                }
            }

            self.refresh_all().await;
        }
    }
}

/// Time until the next occurrence of `hour:00:00` UTC strictly after `now`
fn duration_until_next(now: DateTime<Utc>, hour: u32) -> Duration {
    let today = now
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .unwrap_or_else(|| now.date_naive().and_hms_opt(0, 0, 0).unwrap())
        .and_utc();

    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };

    (next - now).to_std().unwrap_or(Duration::ZERO)
}
