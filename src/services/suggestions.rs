use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::cache::TtlCache;
use crate::catalog::MovieCatalog;
use crate::db::RatingStore;
use crate::error::{AppError, AppResult};
use crate::model::{ModelGateway, ModelStore};
use crate::models::{FeatureRecord, MovieSummary, RankedSuggestion, UserContext};
use crate::services::preprocess::preprocess_movie;
use crate::services::user_context::UserContextService;

/// Raw model scores are in [0, 1]; suggestions carry a 0-5 star scale.
const RATING_SCALE: f32 = 5.0;

/// Assembles ranked suggestion lists on cache misses
///
/// The pipeline never surfaces an error to its caller: per-candidate
/// failures drop that candidate, page failures drop that page, and any
/// remaining error produces an empty list plus a log entry.
pub struct SuggestionService {
    store: Arc<dyn RatingStore>,
    catalog: Arc<dyn MovieCatalog>,
    gateway: Arc<dyn ModelGateway>,
    models: ModelStore,
    user_context: Arc<UserContextService>,
    cache: TtlCache<Vec<RankedSuggestion>>,
    fetch_concurrency: usize,
}

impl SuggestionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn RatingStore>,
        catalog: Arc<dyn MovieCatalog>,
        gateway: Arc<dyn ModelGateway>,
        models: ModelStore,
        user_context: Arc<UserContextService>,
        cache: TtlCache<Vec<RankedSuggestion>>,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            store,
            catalog,
            gateway,
            models,
            user_context,
            cache,
            fetch_concurrency,
        }
    }

    /// Returns the cached list for the user, if still valid
    pub async fn cached_suggestions(&self, user_id: &str) -> Option<Vec<RankedSuggestion>> {
        self.cache.get(user_id).await
    }

    /// Stores a computed list in the suggestion cache
    pub async fn cache_suggestions(&self, user_id: &str, suggestions: Vec<RankedSuggestion>) {
        tracing::info!(
            user_id = %user_id,
            count = suggestions.len(),
            "Caching suggestions"
        );
        self.cache.put(user_id, suggestions).await;
    }

    /// Computes a ranked suggestion list for the user
    ///
    /// Always returns a list; an empty one means either no trained model,
    /// no candidates, or an absorbed failure (logged).
    pub async fn compute(&self, user_id: &str) -> Vec<RankedSuggestion> {
        // A missing or unloadable model is a valid empty result, not an
        // error: the user simply has nothing trained yet.
        let artifact = match self.models.load(user_id).await {
            Ok(bytes) => bytes,
            Err(AppError::NotFound(_)) => {
                tracing::info!(user_id = %user_id, "No trained model, returning no suggestions");
                return Vec::new();
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Failed to load model");
                return Vec::new();
            }
        };

        match self.try_compute(user_id, &artifact).await {
            Ok(suggestions) => {
                tracing::info!(
                    user_id = %user_id,
                    count = suggestions.len(),
                    "Computed suggestions"
                );
                suggestions
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Error computing suggestions");
                Vec::new()
            }
        }
    }

    async fn try_compute(
        &self,
        user_id: &str,
        artifact: &[u8],
    ) -> AppResult<Vec<RankedSuggestion>> {
        let context = Arc::new(self.user_context.resolve(user_id).await?);

        // Two pages of candidates; a failed page contributes nothing
        let mut candidates = self.catalog.fetch_new_releases(1).await.unwrap_or_default();
        candidates.extend(self.catalog.fetch_new_releases(2).await.unwrap_or_default());

        // Never suggest what the user already tracks
        let watchlist: HashSet<i32> = self.store.watchlist_ids(user_id).await?.into_iter().collect();
        candidates.retain(|movie| !watchlist.contains(&movie.id));

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let processed = self.fetch_and_preprocess(candidates, context).await;
        if processed.is_empty() {
            return Ok(Vec::new());
        }

        let (movies, features): (Vec<MovieSummary>, Vec<FeatureRecord>) =
            processed.into_iter().unzip();

        // One batched call for the whole candidate set
        let scores = self.gateway.predict(artifact, &features).await?;

        let mut suggestions: Vec<RankedSuggestion> = movies
            .into_iter()
            .zip(scores)
            .map(|(movie, score)| {
                RankedSuggestion::new(movie, (score * RATING_SCALE).clamp(0.0, RATING_SCALE))
            })
            .collect();

        // Stable sort: ties keep catalog order
        suggestions.sort_by(|a, b| {
            b.predicted_rating
                .partial_cmp(&a.predicted_rating)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(suggestions)
    }

    /// Fetches metadata and preprocesses every candidate with bounded
    /// concurrency, preserving catalog order; failed candidates drop out
    async fn fetch_and_preprocess(
        &self,
        candidates: Vec<MovieSummary>,
        context: Arc<UserContext>,
    ) -> Vec<(MovieSummary, FeatureRecord)> {
        let semaphore = Arc::new(Semaphore::new(self.fetch_concurrency));
        let mut tasks = Vec::with_capacity(candidates.len());

        for movie in candidates {
            let semaphore = Arc::clone(&semaphore);
            let catalog = Arc::clone(&self.catalog);
            let context = Arc::clone(&context);

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                let details = catalog.fetch_movie_details(movie.id).await?;
                let record = preprocess_movie(&details, &context);
                Some((movie, record))
            }));
        }

        let mut processed = Vec::with_capacity(tasks.len());
        let mut dropped = 0usize;
        for task in tasks {
            match task.await {
                Ok(Some(pair)) => processed.push(pair),
                Ok(None) => dropped += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Candidate preprocessing task panicked");
                    dropped += 1;
                }
            }
        }

        if dropped > 0 {
            tracing::warn!(
                kept = processed.len(),
                dropped,
                "Partial candidate preprocessing failure"
            );
        }

        processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::catalog::MockMovieCatalog;
    use crate::db::MockRatingStore;
    use crate::model::MockModelGateway;
    use crate::models::MovieDetails;
    use std::time::Duration;

    fn summary(id: i32, title: &str) -> MovieSummary {
        MovieSummary {
            id,
            title: title.to_string(),
            poster_path: format!("/{}.jpg", id),
            release_date: "2024-06-01".to_string(),
        }
    }

    fn details() -> MovieDetails {
        MovieDetails {
            genres: vec!["Drama".to_string()],
            release_year: 2024,
            duration: 100,
            popularity: 10.0,
            average_rating: 7.0,
            actors: vec!["A".to_string()],
            directors: vec!["Z".to_string()],
        }
    }

    struct Fixture {
        store: MockRatingStore,
        catalog: MockMovieCatalog,
        gateway: MockModelGateway,
        models_dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MockRatingStore::new(),
                catalog: MockMovieCatalog::new(),
                gateway: MockModelGateway::new(),
                models_dir: tempfile::tempdir().unwrap(),
            }
        }

        /// Seeds a model artifact so the pipeline proceeds past the load
        async fn with_model(self, user_id: &str) -> Self {
            let store = ModelStore::new(self.models_dir.path()).unwrap();
            store.save(user_id, b"artifact").await.unwrap();
            self
        }

        fn service(self) -> SuggestionService {
            let models = ModelStore::new(self.models_dir.path()).unwrap();
            // TempDir must outlive the test body; leak it so the files stay
            std::mem::forget(self.models_dir);

            let store = Arc::new(self.store);
            let catalog = Arc::new(self.catalog);
            let user_context = Arc::new(UserContextService::new(
                Arc::clone(&store) as Arc<dyn RatingStore>,
                Arc::clone(&catalog) as Arc<dyn MovieCatalog>,
                TtlCache::new(Duration::from_secs(7200)),
            ));

            SuggestionService::new(
                store,
                catalog,
                Arc::new(self.gateway),
                models,
                user_context,
                TtlCache::new(Duration::from_secs(86400)),
                20,
            )
        }
    }

    /// Standard expectations: empty history so the context is trivial
    fn expect_empty_history(store: &mut MockRatingStore) {
        store
            .expect_movie_ids_and_ratings()
            .returning(|_| Ok((vec![], vec![])));
    }

    #[tokio::test]
    async fn test_no_model_returns_empty_list() {
        let fixture = Fixture::new();
        let service = fixture.service();

        let suggestions = service.compute("u1").await;
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_ranking_is_descending_and_stable_on_ties() {
        let mut fixture = Fixture::new().with_model("u1").await;
        expect_empty_history(&mut fixture.store);
        fixture.store.expect_watchlist_ids().returning(|_| Ok(vec![]));

        fixture.catalog.expect_fetch_new_releases().returning(|page| {
            if page == 1 {
                Some(vec![
                    summary(1, "A"),
                    summary(2, "B"),
                    summary(3, "C"),
                    summary(4, "D"),
                ])
            } else {
                Some(vec![])
            }
        });
        fixture
            .catalog
            .expect_fetch_movie_details()
            .returning(|_| Some(details()));

        // Raw scores scale to predicted ratings [3.2, 4.1, 4.1, 2.0];
        // B and C tie, so B (earlier in catalog order) must come first
        fixture
            .gateway
            .expect_predict()
            .returning(|_, _| Ok(vec![0.64, 0.82, 0.82, 0.40]));

        let suggestions = fixture.service().compute("u1").await;

        let titles: Vec<&str> = suggestions.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "C", "A", "D"]);
        assert!((suggestions[0].predicted_rating - 4.1).abs() < 1e-4);
        assert!((suggestions[3].predicted_rating - 2.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_partial_candidate_failures_keep_the_rest() {
        let mut fixture = Fixture::new().with_model("u1").await;
        expect_empty_history(&mut fixture.store);
        fixture.store.expect_watchlist_ids().returning(|_| Ok(vec![]));

        fixture.catalog.expect_fetch_new_releases().returning(|page| {
            if page == 1 {
                Some((1..=10).map(|i| summary(i, &format!("M{}", i))).collect())
            } else {
                Some(vec![])
            }
        });
        // Metadata for movies 2, 5 and 9 is unavailable
        fixture.catalog.expect_fetch_movie_details().returning(|id| {
            if [2, 5, 9].contains(&id) {
                None
            } else {
                Some(details())
            }
        });

        fixture
            .gateway
            .expect_predict()
            .withf(|_, batch| batch.len() == 7)
            .returning(|_, batch| Ok(vec![0.5; batch.len()]));

        let suggestions = fixture.service().compute("u1").await;
        assert_eq!(suggestions.len(), 7);
        assert!(!suggestions.iter().any(|s| [2, 5, 9].contains(&s.id)));
    }

    #[tokio::test]
    async fn test_watchlist_movies_are_filtered_out() {
        let mut fixture = Fixture::new().with_model("u1").await;
        expect_empty_history(&mut fixture.store);
        fixture
            .store
            .expect_watchlist_ids()
            .returning(|_| Ok(vec![1, 3]));

        fixture.catalog.expect_fetch_new_releases().returning(|page| {
            if page == 1 {
                Some(vec![summary(1, "A"), summary(2, "B"), summary(3, "C")])
            } else {
                Some(vec![])
            }
        });
        fixture
            .catalog
            .expect_fetch_movie_details()
            .returning(|_| Some(details()));
        fixture
            .gateway
            .expect_predict()
            .returning(|_, batch| Ok(vec![0.5; batch.len()]));

        let suggestions = fixture.service().compute("u1").await;
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].id, 2);
    }

    #[tokio::test]
    async fn test_all_candidates_on_watchlist_yields_empty_without_predicting() {
        let mut fixture = Fixture::new().with_model("u1").await;
        expect_empty_history(&mut fixture.store);
        fixture
            .store
            .expect_watchlist_ids()
            .returning(|_| Ok(vec![1, 2]));

        fixture.catalog.expect_fetch_new_releases().returning(|page| {
            if page == 1 {
                Some(vec![summary(1, "A"), summary(2, "B")])
            } else {
                Some(vec![])
            }
        });
        fixture.gateway.expect_predict().times(0);

        let suggestions = fixture.service().compute("u1").await;
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_failed_release_page_degrades_to_other_page() {
        let mut fixture = Fixture::new().with_model("u1").await;
        expect_empty_history(&mut fixture.store);
        fixture.store.expect_watchlist_ids().returning(|_| Ok(vec![]));

        fixture.catalog.expect_fetch_new_releases().returning(|page| {
            if page == 1 {
                None
            } else {
                Some(vec![summary(7, "FromPageTwo")])
            }
        });
        fixture
            .catalog
            .expect_fetch_movie_details()
            .returning(|_| Some(details()));
        fixture
            .gateway
            .expect_predict()
            .returning(|_, batch| Ok(vec![0.9; batch.len()]));

        let suggestions = fixture.service().compute("u1").await;
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].title, "FromPageTwo");
    }

    #[tokio::test]
    async fn test_prediction_failure_is_absorbed_as_empty_list() {
        let mut fixture = Fixture::new().with_model("u1").await;
        expect_empty_history(&mut fixture.store);
        fixture.store.expect_watchlist_ids().returning(|_| Ok(vec![]));

        fixture.catalog.expect_fetch_new_releases().returning(|page| {
            if page == 1 {
                Some(vec![summary(1, "A")])
            } else {
                Some(vec![])
            }
        });
        fixture
            .catalog
            .expect_fetch_movie_details()
            .returning(|_| Some(details()));
        fixture
            .gateway
            .expect_predict()
            .returning(|_, _| Err(AppError::Internal("model exploded".to_string())));

        let suggestions = fixture.service().compute("u1").await;
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_predict_is_called_once_for_the_whole_batch() {
        let mut fixture = Fixture::new().with_model("u1").await;
        expect_empty_history(&mut fixture.store);
        fixture.store.expect_watchlist_ids().returning(|_| Ok(vec![]));

        fixture.catalog.expect_fetch_new_releases().returning(|page| {
            Some(match page {
                1 => vec![summary(1, "A"), summary(2, "B")],
                _ => vec![summary(3, "C")],
            })
        });
        fixture
            .catalog
            .expect_fetch_movie_details()
            .returning(|_| Some(details()));
        fixture
            .gateway
            .expect_predict()
            .times(1)
            .withf(|_, batch| batch.len() == 3)
            .returning(|_, batch| Ok(vec![0.5; batch.len()]));

        let suggestions = fixture.service().compute("u1").await;
        assert_eq!(suggestions.len(), 3);
    }

    #[tokio::test]
    async fn test_predicted_ratings_are_clamped_to_range() {
        let mut fixture = Fixture::new().with_model("u1").await;
        expect_empty_history(&mut fixture.store);
        fixture.store.expect_watchlist_ids().returning(|_| Ok(vec![]));

        fixture.catalog.expect_fetch_new_releases().returning(|page| {
            if page == 1 {
                Some(vec![summary(1, "A"), summary(2, "B")])
            } else {
                Some(vec![])
            }
        });
        fixture
            .catalog
            .expect_fetch_movie_details()
            .returning(|_| Some(details()));
        // An out-of-range raw score must not escape the rating range
        fixture
            .gateway
            .expect_predict()
            .returning(|_, _| Ok(vec![1.4, -0.2]));

        let suggestions = fixture.service().compute("u1").await;
        assert_eq!(suggestions[0].predicted_rating, 5.0);
        assert_eq!(suggestions[1].predicted_rating, 0.0);
    }
}
