use async_trait::async_trait;
use certsync_core::UtcDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::CertStoreError;

/// PEM material for one import call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub certificate: Vec<u8>,
    pub private_key: Vec<u8>,
    pub chain: Option<Vec<u8>>,
    /// Re-import over this handle instead of creating a new entry
    pub existing_handle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateDetails {
    pub domain_name: String,
    pub not_after: Option<UtcDateTime>,
    pub status: Option<String>,
}

#[async_trait]
pub trait ManagedCertificateStore: Send + Sync {
    /// Handle of the created or rotated entry, `None` if the store returned none
    async fn import(&self, request: ImportRequest) -> Result<Option<String>, CertStoreError>;

    /// `None` when the handle no longer resolves
    async fn describe(&self, handle: &str) -> Result<Option<CertificateDetails>, CertStoreError>;

    async fn add_tags(&self, handle: &str, tags: &[(String, String)]) -> Result<(), CertStoreError>;
}
