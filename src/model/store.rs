use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

const MODEL_EXTENSION: &str = "model";

/// Filesystem store for per-user model artifacts
///
/// One file per user, `{models_dir}/{user_id}.model`. The directory listing
/// is the source of truth for which users have a trained model; no separate
/// registry exists.
#[derive(Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn model_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", user_id, MODEL_EXTENSION))
    }

    /// Persists a freshly trained artifact, replacing any previous one
    /// wholesale
    pub async fn save(&self, user_id: &str, artifact: &[u8]) -> AppResult<()> {
        let path = self.model_path(user_id);
        // Write-then-rename so a concurrent load never sees a half-written
        // artifact.
        let tmp_path = path.with_extension("model.tmp");
        tokio::fs::write(&tmp_path, artifact).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        tracing::info!(user_id = %user_id, path = %path.display(), "Model artifact saved");
        Ok(())
    }

    /// Loads the persisted artifact for a user
    pub async fn load(&self, user_id: &str) -> AppResult<Vec<u8>> {
        let path = self.model_path(user_id);
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("No trained model for user {}", user_id))
            } else {
                AppError::Io(e)
            }
        })
    }

    /// Enumerates every user with a persisted model artifact
    pub fn list_trained_user_ids(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(dir = %self.dir.display(), error = %e, "Failed to list models directory");
                return Vec::new();
            }
        };

        let mut user_ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(MODEL_EXTENSION))
            .filter_map(|path: PathBuf| {
                Path::file_stem(&path)
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
            })
            .collect();
        user_ids.sort();

        tracing::info!(count = user_ids.len(), "Found users with trained models");
        user_ids
    }
}
