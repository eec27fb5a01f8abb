use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::models::RotationState;

/// JSON file holding the rotation cursor between runs.
#[derive(Debug, Clone)]
pub struct RotationStore {
    path: PathBuf,
}

impl RotationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved state for a pool of `pool_size` accounts.
    ///
    /// A missing file yields the default state. A cursor outside the pool
    /// (the pool shrank since the last run) is reset to 0.
    pub async fn load(&self, pool_size: usize) -> anyhow::Result<RotationState> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No saved rotation state, starting at index 0");
                return Ok(RotationState::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };

        let mut state: RotationState = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;

        if state.current_index >= pool_size {
            tracing::warn!(
                saved_index = state.current_index,
                pool_size,
                "Saved rotation index outside pool, resetting to 0"
            );
            state.current_index = 0;
        }

        tracing::info!(
            index = state.current_index,
            cycles_completed = state.cycles_completed,
            "Rotation state restored"
        );
        Ok(state)
    }

    /// Write `state`, replacing the file atomically via a sibling temp file.
    pub async fn save(&self, state: &RotationState) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("renaming {} to {}", tmp.display(), self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = RotationStore::new(dir.path().join("rotation.json"));
        let state = store.load(4).await.unwrap();
        assert_eq!(state, RotationState::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = RotationStore::new(dir.path().join("rotation.json"));
        let state = RotationState {
            current_index: 3,
            cycles_completed: 17,
        };
        store.save(&state).await.unwrap();
        assert_eq!(store.load(4).await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_index_beyond_pool_resets() {
        let dir = tempfile::tempdir().unwrap();
        let store = RotationStore::new(dir.path().join("rotation.json"));
        store
            .save(&RotationState {
                current_index: 5,
                cycles_completed: 9,
            })
            .await
            .unwrap();

        let state = store.load(3).await.unwrap();
        assert_eq!(state.current_index, 0);
        assert_eq!(state.cycles_completed, 9);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotation.json");
        tokio::fs::write(&path, b"not json").await.unwrap();
        assert!(RotationStore::new(path).load(2).await.is_err());
    }
}
