use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{FeatureRecord, TrainingExample};

use super::ModelGateway;

/// Content-based model: a rating-weighted taste profile per vocabulary slot
///
/// For each genre/actor/director slot the profile holds the mean normalized
/// rating of the user's movies carrying that value. Prediction averages the
/// affinities of a candidate's active slots and blends in the candidate's
/// own catalog rating. Deliberately simple; the orchestrator only depends
/// on the [`ModelGateway`] trait, so a heavier model can be swapped in
/// behind the same artifact bytes.
#[derive(Clone, Default)]
pub struct ProfileGateway;

impl ProfileGateway {
    pub fn new() -> Self {
        Self
    }
}

const CATALOG_RATING_BLEND: f32 = 0.3;

#[derive(Debug, Serialize, Deserialize)]
struct TasteProfile {
    genre_affinity: Vec<f32>,
    actor_affinity: Vec<f32>,
    director_affinity: Vec<f32>,
    mean_rating: f32,
}

/// Mean rating per active slot; slots never seen active fall back to the
/// overall mean.
fn slot_affinities(
    examples: &[TrainingExample],
    select: impl Fn(&FeatureRecord) -> &[f32],
    width: usize,
    mean_rating: f32,
) -> Vec<f32> {
    let mut sums = vec![0.0f32; width];
    let mut counts = vec![0.0f32; width];

    for example in examples {
        for (i, active) in select(&example.features).iter().enumerate() {
            if *active > 0.0 {
                sums[i] += example.rating;
                counts[i] += 1.0;
            }
        }
    }

    sums.iter()
        .zip(counts.iter())
        .map(|(sum, count)| if *count > 0.0 { sum / count } else { mean_rating })
        .collect()
}

impl TasteProfile {
    fn fit(examples: &[TrainingExample]) -> AppResult<Self> {
        let first = examples
            .first()
            .ok_or_else(|| AppError::Training("No training examples".to_string()))?;

        let mean_rating =
            examples.iter().map(|e| e.rating).sum::<f32>() / examples.len() as f32;

        Ok(Self {
            genre_affinity: slot_affinities(
                examples,
                |f| &f.genre_vector,
                first.features.genre_vector.len(),
                mean_rating,
            ),
            actor_affinity: slot_affinities(
                examples,
                |f| &f.actor_vector,
                first.features.actor_vector.len(),
                mean_rating,
            ),
            director_affinity: slot_affinities(
                examples,
                |f| &f.director_vector,
                first.features.director_vector.len(),
                mean_rating,
            ),
            mean_rating,
        })
    }

    fn score(&self, candidate: &FeatureRecord) -> AppResult<f32> {
        if candidate.genre_vector.len() != self.genre_affinity.len()
            || candidate.actor_vector.len() != self.actor_affinity.len()
            || candidate.director_vector.len() != self.director_affinity.len()
        {
            // A width mismatch means the candidate was preprocessed against
            // a different vocabulary version than this model was trained on.
            return Err(AppError::Internal(
                "Feature width does not match trained vocabulary".to_string(),
            ));
        }

        let mut affinity_sum = 0.0f32;
        let mut active = 0.0f32;
        for (weights, vector) in [
            (&self.genre_affinity, &candidate.genre_vector),
            (&self.actor_affinity, &candidate.actor_vector),
            (&self.director_affinity, &candidate.director_vector),
        ] {
            for (w, v) in weights.iter().zip(vector.iter()) {
                if *v > 0.0 {
                    affinity_sum += w;
                    active += 1.0;
                }
            }
        }

        let affinity = if active > 0.0 {
            affinity_sum / active
        } else {
            self.mean_rating
        };

        let score = (1.0 - CATALOG_RATING_BLEND) * affinity
            + CATALOG_RATING_BLEND * candidate.average_rating;
        Ok(score.clamp(0.0, 1.0))
    }
}

#[async_trait]
impl ModelGateway for ProfileGateway {
    async fn train(&self, examples: &[TrainingExample]) -> AppResult<Vec<u8>> {
        let profile = TasteProfile::fit(examples)?;
        serde_json::to_vec(&profile)
            .map_err(|e| AppError::Internal(format!("Artifact encoding error: {}", e)))
    }

    async fn predict(&self, artifact: &[u8], batch: &[FeatureRecord]) -> AppResult<Vec<f32>> {
        let profile: TasteProfile = serde_json::from_slice(artifact)
            .map_err(|e| AppError::Internal(format!("Artifact decoding error: {}", e)))?;

        batch.iter().map(|record| profile.score(record)).collect()
    }
}
