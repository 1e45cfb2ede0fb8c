//! TMDB-style movie catalog boundary
//!
//! Catalog failures are absorbed here: both operations return `None` when
//! the upstream call fails, so callers degrade per unit of work instead of
//! aborting a whole pipeline run.

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use crate::models::{MovieDetails, MovieSummary, TmdbMovieDetails, TmdbNowPlaying};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MovieCatalog: Send + Sync {
    /// Fetches full metadata for one movie; `None` if the catalog cannot
    /// provide it
    async fn fetch_movie_details(&self, movie_id: i32) -> Option<MovieDetails>;

    /// Fetches one page of new releases; `None` if the catalog cannot
    /// provide it
    async fn fetch_new_releases(&self, page: u32) -> Option<Vec<MovieSummary>>;
}

#[derive(Clone)]
pub struct TmdbCatalog {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl TmdbCatalog {
    pub fn new(api_key: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
        }
    }
}

#[async_trait]
impl MovieCatalog for TmdbCatalog {
    async fn fetch_movie_details(&self, movie_id: i32) -> Option<MovieDetails> {
        let url = format!("{}/movie/{}", self.api_url, movie_id);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("append_to_response", "credits"),
            ])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(movie_id, error = %e, "Movie details request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::error!(
                movie_id,
                status = %response.status(),
                "Failed to fetch movie details"
            );
            return None;
        }

        match response.json::<TmdbMovieDetails>().await {
            Ok(raw) => Some(MovieDetails::from(raw)),
            Err(e) => {
                tracing::error!(movie_id, error = %e, "Failed to parse movie details");
                None
            }
        }
    }

    async fn fetch_new_releases(&self, page: u32) -> Option<Vec<MovieSummary>> {
        let url = format!("{}/movie/now_playing", self.api_url);
        let page_param = page.to_string();

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("page", page_param.as_str()),
            ])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(page, error = %e, "New releases request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::error!(page, status = %response.status(), "Failed to fetch new releases");
            return None;
        }

        match response.json::<TmdbNowPlaying>().await {
            Ok(listing) => {
                let releases: Vec<MovieSummary> =
                    listing.results.into_iter().map(MovieSummary::from).collect();
                tracing::debug!(page, count = releases.len(), "Fetched new releases");
                Some(releases)
            }
            Err(e) => {
                tracing::error!(page, error = %e, "Failed to parse new releases");
                None
            }
        }
    }
}
