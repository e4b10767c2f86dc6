use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tidelink_core::{DeferralError, DeferralStorage};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

/// File-backed [`DeferralStorage`].
///
/// Each key maps to `<dir>/<key>.json` plus a `<key>.sha256` checksum file.
/// Writes go to a temporary file that is synced and then renamed over the
/// target, so a crash leaves either the old or the new blob in place.
#[derive(Debug, Clone)]
pub struct FileDeferralStorage {
    dir: PathBuf,
}

impl FileDeferralStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf, DeferralError> {
        let valid = !key.is_empty()
            && key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(DeferralError::storage(key, "key must be a plain file name"));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn checksum(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }
}

#[async_trait]
impl DeferralStorage for FileDeferralStorage {
    #[instrument(skip(self, blob), fields(bytes = blob.len()))]
    async fn save(&self, key: &str, blob: &[u8]) -> Result<(), DeferralError> {
        let path = self.blob_path(key)?;
        let io = |err: std::io::Error| DeferralError::storage(key, err.to_string());

        fs::create_dir_all(&self.dir).await.map_err(io)?;

        let temp_path = path.with_extension("tmp");
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .await
            .map_err(io)?;
        file.write_all(blob).await.map_err(io)?;
        file.sync_all().await.map_err(io)?;
        drop(file);

        fs::rename(&temp_path, &path).await.map_err(io)?;

        let checksum_path = path.with_extension("sha256");
        if let Err(err) = fs::write(&checksum_path, Self::checksum(blob)).await {
            warn!(key, error = %err, "Failed to write checksum file");
        }

        debug!(key, path = %path.display(), "Persisted deferral blob");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, DeferralError> {
        let path = self.blob_path(key)?;

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(key, "No persisted deferral blob");
                return Ok(None);
            }
            Err(err) => return Err(DeferralError::storage(key, err.to_string())),
        };

        let checksum_path = path.with_extension("sha256");
        if let Ok(expected) = fs::read_to_string(&checksum_path).await {
            if expected.trim() != Self::checksum(&data) {
                return Err(DeferralError::corrupt(key, "checksum mismatch"));
            }
        }

        Ok(Some(data))
    }
}
