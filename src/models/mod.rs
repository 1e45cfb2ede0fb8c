use serde::{Deserialize, Serialize};

/// The kind of change a movie event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Add,
    Delete,
    Rate,
}

/// A rating/watchlist change for exactly one user
///
/// Doubles as the cache-invalidation signal and the training trigger.
/// Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieEvent {
    pub event_type: EventType,
    pub user_id: String,
    pub movie_id: i32,
    #[serde(default)]
    pub rating: Option<i32>,
}

/// Summary entry from the catalog's new-releases listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: i32,
    pub title: String,
    pub poster_path: String,
    pub release_date: String,
}

/// Full movie metadata as consumed by preprocessing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub genres: Vec<String>,
    pub release_year: i32,
    /// Runtime in minutes
    pub duration: i32,
    pub popularity: f32,
    pub average_rating: f32,
    /// Top-billed cast only
    pub actors: Vec<String>,
    pub directors: Vec<String>,
}

/// Per-user vocabulary and history size
///
/// The vocabularies are sorted, deduplicated lists; a value's index defines
/// its slot in the feature vectors a model was trained against. A cached
/// context must therefore never outlive a retrain of the same user's model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub genres: Vec<String>,
    pub actors: Vec<String>,
    pub directors: Vec<String>,
    pub history_size: usize,
}

/// Fixed-width numeric features for one movie under one user's vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub genre_vector: Vec<f32>,
    pub actor_vector: Vec<f32>,
    pub director_vector: Vec<f32>,
    pub release_year: f32,
    pub duration: f32,
    pub popularity: f32,
    pub average_rating: f32,
}

/// One training observation: preprocessed features plus a normalized rating
/// in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub features: FeatureRecord,
    pub rating: f32,
}

/// A suggestion candidate with its predicted rating attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSuggestion {
    pub id: i32,
    pub title: String,
    pub poster_path: String,
    pub release_date: String,
    /// Scaled to the [0, 5] rating range
    pub predicted_rating: f32,
}

impl RankedSuggestion {
    pub fn new(summary: MovieSummary, predicted_rating: f32) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            poster_path: summary.poster_path,
            release_date: summary.release_date,
            predicted_rating,
        }
    }
}

// ============================================================================
// TMDB API Types
// ============================================================================

/// Raw response from GET /movie/{id}?append_to_response=credits
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovieDetails {
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub runtime: Option<i32>,
    #[serde(default)]
    pub popularity: Option<f32>,
    #[serde(default)]
    pub vote_average: Option<f32>,
    #[serde(default)]
    pub credits: Option<TmdbCredits>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbGenre {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TmdbCredits {
    #[serde(default)]
    pub cast: Vec<TmdbCastMember>,
    #[serde(default)]
    pub crew: Vec<TmdbCrewMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCastMember {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCrewMember {
    pub name: String,
    pub job: String,
}

/// Raw response from GET /movie/now_playing
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbNowPlaying {
    #[serde(default)]
    pub results: Vec<TmdbNowPlayingEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbNowPlayingEntry {
    pub id: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

impl From<TmdbNowPlayingEntry> for MovieSummary {
    fn from(entry: TmdbNowPlayingEntry) -> Self {
        MovieSummary {
            id: entry.id,
            title: entry.title,
            poster_path: entry.poster_path.unwrap_or_default(),
            release_date: entry.release_date.unwrap_or_default(),
        }
    }
}

impl From<TmdbMovieDetails> for MovieDetails {
    fn from(raw: TmdbMovieDetails) -> Self {
        let release_year = raw
            .release_date
            .as_deref()
            .and_then(|d| d.split('-').next())
            .and_then(|y| y.parse::<i32>().ok())
            .unwrap_or(0);

        let credits = raw.credits.unwrap_or_default();
        // Top 5 billed actors only
        let actors: Vec<String> = credits.cast.into_iter().take(5).map(|c| c.name).collect();
        let directors: Vec<String> = credits
            .crew
            .into_iter()
            .filter(|c| c.job == "Director")
            .map(|c| c.name)
            .collect();

        MovieDetails {
            genres: raw.genres.into_iter().map(|g| g.name).collect(),
            release_year,
            duration: raw.runtime.unwrap_or(0),
            popularity: raw.popularity.unwrap_or(0.0),
            average_rating: raw.vote_average.unwrap_or(0.0),
            actors,
            directors,
        }
    }
}
