use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppResult;

use super::RatingStore;

/// Postgres-backed rating/watchlist store
#[derive(Clone)]
pub struct PgRatingStore {
    pool: PgPool,
}

impl PgRatingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Ratings are stored on a 0-5 integer scale; the model consumes [0, 1].
/// Missing or zero ratings get a neutral 2.5/5 placeholder so unrated
/// watchlist entries still contribute to training.
fn normalize_rating(raw: Option<i32>) -> f32 {
    match raw {
        Some(r) if r > 0 => r as f32 / 5.0,
        _ => 0.5,
    }
}

#[async_trait]
impl RatingStore for PgRatingStore {
    async fn movie_ids_and_ratings(&self, user_id: &str) -> AppResult<(Vec<i32>, Vec<f32>)> {
        let rows: Vec<(i32, Option<i32>)> =
            sqlx::query_as("SELECT movie_id, rating FROM movie WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        let mut movie_ids = Vec::with_capacity(rows.len());
        let mut ratings = Vec::with_capacity(rows.len());
        for (movie_id, rating) in rows {
            movie_ids.push(movie_id);
            ratings.push(normalize_rating(rating));
        }

        Ok((movie_ids, ratings))
    }

    async fn watchlist_ids(&self, user_id: &str) -> AppResult<Vec<i32>> {
        let rows: Vec<(i32,)> = sqlx::query_as("SELECT movie_id FROM movie WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
