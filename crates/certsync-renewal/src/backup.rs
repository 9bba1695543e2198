//! Timestamped copies of issued PEM files

use certsync_core::{utils, UtcDateTime};
use certsync_issuer::CertificatePaths;
use certsync_storage::{StateSync, StorageError};
use tokio::fs;
use tracing::info;

use crate::errors::RenewalError;

/// `{base}/{certificate_id}/{timestamp}`
pub fn backup_prefix_for(base: &str, certificate_id: &str, now: UtcDateTime) -> String {
    let base = base.trim_matches('/');
    let stamp = utils::backup_timestamp(now);
    if base.is_empty() {
        format!("{}/{}", certificate_id, stamp)
    } else {
        format!("{}/{}/{}", base, certificate_id, stamp)
    }
}

/// Upload the four artifacts; returns the keys written
pub(crate) async fn backup_artifacts(
    sync: &StateSync,
    base: &str,
    certificate_id: &str,
    paths: &CertificatePaths,
    now: UtcDateTime,
) -> Result<Vec<String>, RenewalError> {
    let prefix = backup_prefix_for(base, certificate_id, now);
    let mut keys = Vec::with_capacity(4);

    for (name, path) in paths.files() {
        let body = fs::read(path)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        let key = format!("{}/{}", prefix, name);
        sync.put_bytes(&key, body).await?;
        keys.push(key);
    }

    info!("Backed up {} to {}/", certificate_id, prefix);
    Ok(keys)
}
