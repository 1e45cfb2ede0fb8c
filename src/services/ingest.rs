use crate::cache::TtlCache;
use crate::models::{MovieEvent, RankedSuggestion, UserContext};
use crate::services::training::TrainingQueue;

/// Turns raw event payloads into cache invalidations plus training jobs
///
/// Invalidation happens before the job is queued, so a request arriving
/// between the two sees a cache miss and recomputes rather than serving
/// state from before the event.
pub struct EventIngestor {
    context_cache: TtlCache<UserContext>,
    suggestion_cache: TtlCache<Vec<RankedSuggestion>>,
    queue: TrainingQueue,
}

impl EventIngestor {
    pub fn new(
        context_cache: TtlCache<UserContext>,
        suggestion_cache: TtlCache<Vec<RankedSuggestion>>,
        queue: TrainingQueue,
    ) -> Self {
        Self {
            context_cache,
            suggestion_cache,
            queue,
        }
    }

    /// Processes one raw payload; malformed or invalid events are logged
    /// and dropped without touching any state
    pub async fn handle_payload(&self, payload: &[u8]) {
        let event: MovieEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "Dropping malformed movie event");
                return;
            }
        };

        if event.user_id.trim().is_empty() {
            tracing::warn!("Dropping movie event with empty user id");
            return;
        }

        tracing::info!(
            user_id = %event.user_id,
            event_type = ?event.event_type,
            movie_id = event.movie_id,
            "Received movie event"
        );

        self.context_cache.invalidate(&event.user_id).await;
        self.suggestion_cache.invalidate(&event.user_id).await;
        self.queue.enqueue(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn setup() -> (EventIngestor, mpsc::UnboundedReceiver<MovieEvent>) {
        let (queue, rx) = TrainingQueue::new();
        let ingestor = EventIngestor::new(
            TtlCache::new(Duration::from_secs(7200)),
            TtlCache::new(Duration::from_secs(86400)),
            queue,
        );
        (ingestor, rx)
    }

    fn context(user_id: &str) -> UserContext {
        UserContext {
            user_id: user_id.to_string(),
            genres: vec![],
            actors: vec![],
            directors: vec![],
            history_size: 0,
        }
    }

    #[tokio::test]
    async fn test_valid_event_invalidates_caches_and_queues_training() {
        let (ingestor, mut rx) = setup();
        ingestor.context_cache.put("u1", context("u1")).await;
        ingestor.context_cache.put("other", context("other")).await;
        ingestor.suggestion_cache.put("u1", vec![]).await;

        let payload =
            br#"{"eventType":"RATE","userId":"u1","movieId":42,"rating":4}"#;
        ingestor.handle_payload(payload).await;

        // Only the event's user is invalidated
        assert!(ingestor.context_cache.get("u1").await.is_none());
        assert!(ingestor.suggestion_cache.get("u1").await.is_none());
        assert!(ingestor.context_cache.get("other").await.is_some());

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type, EventType::Rate);
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.movie_id, 42);
        assert_eq!(event.rating, Some(4));
    }

    #[tokio::test]
    async fn test_event_without_rating_is_accepted() {
        let (ingestor, mut rx) = setup();

        let payload = br#"{"eventType":"ADD","userId":"u1","movieId":7}"#;
        ingestor.handle_payload(payload).await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type, EventType::Add);
        assert_eq!(event.rating, None);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped() {
        let (ingestor, mut rx) = setup();
        ingestor.context_cache.put("u1", context("u1")).await;

        ingestor.handle_payload(b"not json at all").await;
        ingestor
            .handle_payload(br#"{"eventType":"RATE","movieId":42}"#)
            .await;
        ingestor
            .handle_payload(br#"{"eventType":"SELF_DESTRUCT","userId":"u1","movieId":1}"#)
            .await;

        // Nothing queued, nothing invalidated
        assert!(rx.try_recv().is_err());
        assert!(ingestor.context_cache.get("u1").await.is_some());
    }

    #[tokio::test]
    async fn test_empty_user_id_is_dropped() {
        let (ingestor, mut rx) = setup();

        let payload = br#"{"eventType":"RATE","userId":"  ","movieId":42,"rating":4}"#;
        ingestor.handle_payload(payload).await;

        assert!(rx.try_recv().is_err());
    }
}
