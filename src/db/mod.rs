use async_trait::async_trait;

use crate::error::AppResult;

mod postgres;

pub use postgres::PgRatingStore;

/// Boundary to the persisted rating/watchlist storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Returns the user's historical movie ids alongside their normalized
    /// ratings in [0, 1]. Unrated movies carry a neutral placeholder.
    async fn movie_ids_and_ratings(&self, user_id: &str) -> AppResult<(Vec<i32>, Vec<f32>)>;

    /// Returns all movie ids on the user's watchlist
    async fn watchlist_ids(&self, user_id: &str) -> AppResult<Vec<i32>>;
}
