use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::models::RankedSuggestion;

use super::auth::AuthenticatedUser;
use super::AppState;

const API_VERSION: &str = "2.0";

#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    /// Accepted for compatibility with existing clients; the full ranked
    /// list is always returned
    #[serde(rename = "numOfMovies")]
    #[allow(dead_code)]
    pub num_of_movies: Option<usize>,
}

/// Personalized suggestions for the authenticated user
///
/// A valid cache entry is returned as-is, even when empty. On a miss the
/// list is computed; an empty result means no trained model (or no
/// candidates) and maps to 404.
pub async fn get_suggestions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(_params): Query<SuggestionParams>,
) -> Result<Json<Vec<RankedSuggestion>>, AppError> {
    if let Some(suggestions) = state.suggestions.cached_suggestions(&user.user_id).await {
        tracing::info!(user_id = %user.user_id, "Returning cached suggestions");
        return Ok(Json(suggestions));
    }

    tracing::info!(user_id = %user.user_id, "Computing suggestions on cache miss");
    let suggestions = state.suggestions.compute(&user.user_id).await;

    if suggestions.is_empty() {
        return Err(AppError::NotFound(format!(
            "No suggestions available for user {}. Please ensure the model is trained.",
            user.user_id
        )));
    }

    state
        .suggestions
        .cache_suggestions(&user.user_id, suggestions.clone())
        .await;

    Ok(Json(suggestions))
}

/// Health check endpoint
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "UP" }))
}

/// Service identity endpoint
pub async fn info() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": API_VERSION,
    }))
}

/// Version endpoint
pub async fn version() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "version": API_VERSION })))
}
