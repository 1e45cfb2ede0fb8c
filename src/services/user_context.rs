use std::collections::BTreeSet;
use std::sync::Arc;

use crate::cache::TtlCache;
use crate::catalog::MovieCatalog;
use crate::db::RatingStore;
use crate::error::AppResult;
use crate::models::UserContext;

/// Cache-aside resolution of per-user vocabularies
///
/// On a miss the context is rebuilt from the rating store and the catalog:
/// the genres/actors/directors of every movie in the user's history are
/// unioned and sorted, which assigns each value a stable feature index.
/// Individual metadata fetch failures skip that movie rather than failing
/// the whole resolution.
pub struct UserContextService {
    store: Arc<dyn RatingStore>,
    catalog: Arc<dyn MovieCatalog>,
    cache: TtlCache<UserContext>,
}

impl UserContextService {
    pub fn new(
        store: Arc<dyn RatingStore>,
        catalog: Arc<dyn MovieCatalog>,
        cache: TtlCache<UserContext>,
    ) -> Self {
        Self {
            store,
            catalog,
            cache,
        }
    }

    pub async fn resolve(&self, user_id: &str) -> AppResult<UserContext> {
        if let Some(context) = self.cache.get(user_id).await {
            return Ok(context);
        }

        let context = self.build(user_id).await?;
        self.cache.put(user_id, context.clone()).await;
        Ok(context)
    }

    async fn build(&self, user_id: &str) -> AppResult<UserContext> {
        let (movie_ids, _ratings) = self.store.movie_ids_and_ratings(user_id).await?;

        let mut genres = BTreeSet::new();
        let mut actors = BTreeSet::new();
        let mut directors = BTreeSet::new();

        for movie_id in &movie_ids {
            match self.catalog.fetch_movie_details(*movie_id).await {
                Some(details) => {
                    genres.extend(details.genres);
                    actors.extend(details.actors);
                    directors.extend(details.directors);
                }
                None => {
                    tracing::warn!(
                        user_id = %user_id,
                        movie_id,
                        "Skipping movie with unavailable metadata"
                    );
                }
            }
        }

        let context = UserContext {
            user_id: user_id.to_string(),
            genres: genres.into_iter().collect(),
            actors: actors.into_iter().collect(),
            directors: directors.into_iter().collect(),
            history_size: movie_ids.len(),
        };

        tracing::debug!(
            user_id = %user_id,
            genres = context.genres.len(),
            actors = context.actors.len(),
            directors = context.directors.len(),
            history_size = context.history_size,
            "User context built"
        );

        Ok(context)
    }
}
