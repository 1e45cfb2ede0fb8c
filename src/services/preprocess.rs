use crate::models::{FeatureRecord, MovieDetails, UserContext};

fn one_hot(vocab: &[String], values: &[String]) -> Vec<f32> {
    vocab
        .iter()
        .map(|slot| if values.contains(slot) { 1.0 } else { 0.0 })
        .collect()
}

/// Converts raw movie metadata into a fixed-width feature record under the
/// user's vocabulary
///
/// Vector widths and slot order come from the (sorted) context
/// vocabularies, so a record is only meaningful to a model trained against
/// the same vocabulary version.
pub fn preprocess_movie(details: &MovieDetails, context: &UserContext) -> FeatureRecord {
    FeatureRecord {
        genre_vector: one_hot(&context.genres, &details.genres),
        actor_vector: one_hot(&context.actors, &details.actors),
        director_vector: one_hot(&context.directors, &details.directors),
        release_year: (details.release_year as f32 - 1900.0) / 120.0,
        duration: details.duration as f32 / 300.0,
        popularity: details.popularity / 1000.0,
        average_rating: details.average_rating / 10.0,
    }
}
