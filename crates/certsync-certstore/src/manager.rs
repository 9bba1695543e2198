use std::path::Path;
use std::sync::Arc;

use certsync_core::UtcDateTime;
use certsync_issuer::CertificatePaths;
use chrono::{SecondsFormat, Utc};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::errors::CertStoreError;
use crate::renewal::{days_until_expiry, renewal_due};
use crate::store::{CertificateDetails, ImportRequest, ManagedCertificateStore};

pub const MANAGED_BY_TAG_VALUE: &str = "certsync";

pub struct CertificateManager {
    store: Arc<dyn ManagedCertificateStore>,
}

impl CertificateManager {
    pub fn new(store: Arc<dyn ManagedCertificateStore>) -> Self {
        Self { store }
    }

    /// Import the lineage, re-importing over `existing_handle` when given.
    ///
    /// Returns the handle the store reports. Tags are only written on first import and a
    /// tagging failure does not fail the import.
    pub async fn import(
        &self,
        paths: &CertificatePaths,
        certificate_id: &str,
        existing_handle: Option<&str>,
    ) -> Result<String, CertStoreError> {
        let request = ImportRequest {
            certificate: read_pem(&paths.cert_path).await?,
            private_key: read_pem(&paths.private_key_path).await?,
            chain: Some(read_pem(&paths.chain_path).await?),
            existing_handle: existing_handle.map(str::to_string),
        };

        let handle = self.store.import(request).await?.ok_or_else(|| {
            CertStoreError::Import(format!(
                "store returned no handle for certificate {}",
                certificate_id
            ))
        })?;

        match existing_handle {
            Some(_) => info!("Re-imported certificate {} into {}", certificate_id, handle),
            None => {
                info!("Imported new certificate {} as {}", certificate_id, handle);
                let tags = vec![
                    ("managedBy".to_string(), MANAGED_BY_TAG_VALUE.to_string()),
                    ("certificateId".to_string(), certificate_id.to_string()),
                    (
                        "lastRenewal".to_string(),
                        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                    ),
                ];
                if let Err(e) = self.store.add_tags(&handle, &tags).await {
                    warn!("Failed to tag certificate {}: {}", handle, e);
                }
            }
        }

        Ok(handle)
    }

    pub async fn describe(&self, handle: &str) -> Result<Option<CertificateDetails>, CertStoreError> {
        self.store.describe(handle).await
    }

    pub async fn needs_renewal(&self, handle: &str, threshold_days: u32) -> Result<bool, CertStoreError> {
        self.needs_renewal_at(handle, threshold_days, Utc::now()).await
    }

    pub async fn needs_renewal_at(
        &self,
        handle: &str,
        threshold_days: u32,
        now: UtcDateTime,
    ) -> Result<bool, CertStoreError> {
        let details = self.store.describe(handle).await?;
        let due = renewal_due(details.as_ref(), threshold_days, now);

        match details.as_ref().and_then(|d| d.not_after) {
            Some(not_after) => debug!(
                "Certificate {} expires in {} days (threshold {}): due={}",
                handle,
                days_until_expiry(not_after, now),
                threshold_days,
                due
            ),
            None => debug!("Certificate {} has no known expiry, treating as due", handle),
        }
        Ok(due)
    }
}

async fn read_pem(path: &Path) -> Result<Vec<u8>, CertStoreError> {
    fs::read(path).await.map_err(|e| CertStoreError::io(path, e))
}
