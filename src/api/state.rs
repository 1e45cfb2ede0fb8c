use std::sync::Arc;

use jsonwebtoken::DecodingKey;

use crate::services::SuggestionService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub suggestions: Arc<SuggestionService>,
    pub jwt_decoding_key: Arc<DecodingKey>,
}

impl AppState {
    pub fn new(suggestions: Arc<SuggestionService>, jwt_decoding_key: DecodingKey) -> Self {
        Self {
            suggestions,
            jwt_decoding_key: Arc::new(jwt_decoding_key),
        }
    }
}
