use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{FeatureRecord, TrainingExample};

mod profile;
mod store;

pub use profile::ProfileGateway;
pub use store::ModelStore;

/// Boundary for training and scoring per-user recommendation models
///
/// Artifacts are opaque byte blobs; the orchestrator only moves them
/// between this gateway and the [`ModelStore`]. Raw prediction scores are
/// in [0, 1] and get scaled to the rating range by the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Fits a fresh model to the given examples and returns its serialized
    /// artifact
    async fn train(&self, examples: &[TrainingExample]) -> AppResult<Vec<u8>>;

    /// Scores a batch of candidates against a previously trained artifact
    async fn predict(&self, artifact: &[u8], batch: &[FeatureRecord]) -> AppResult<Vec<f32>>;
}
