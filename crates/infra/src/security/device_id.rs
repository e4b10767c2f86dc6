//! Stable per-installation device identifier.

use std::path::Path;

use tidelink_domain::{Result, TidelinkError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::InfraError;

const DEVICE_ID_FILE: &str = "device_id";

/// Loads the identifier stored in `<data_dir>/device_id`, generating and
/// persisting a UUID v4 the first time.
///
/// # Errors
/// Returns a persistence error if the directory or file cannot be written.
pub async fn load_or_create(data_dir: &Path) -> Result<String> {
    let path = data_dir.join(DEVICE_ID_FILE);

    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => {
            let id = contents.trim();
            if !id.is_empty() {
                return Ok(id.to_string());
            }
            warn!(path = %path.display(), "Device id file is empty; regenerating");
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(TidelinkError::from(InfraError::from(err))),
    }

    let id = Uuid::new_v4().to_string();
    tokio::fs::create_dir_all(data_dir)
        .await
        .map_err(|e| TidelinkError::from(InfraError::from(e)))?;
    tokio::fs::write(&path, &id).await.map_err(|e| TidelinkError::from(InfraError::from(e)))?;
    info!(path = %path.display(), "Generated new device id");
    Ok(id)
}
