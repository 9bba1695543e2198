//! In-memory certificate store for tests

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use certsync_core::UtcDateTime;
use chrono::{Duration, TimeZone, Utc};

use crate::errors::CertStoreError;
use crate::store::{CertificateDetails, ImportRequest, ManagedCertificateStore};

/// Expiry assumed when the imported material is not a parseable certificate
const FALLBACK_VALIDITY_DAYS: i64 = 90;

#[derive(Debug, Clone)]
pub struct StoredCertificate {
    pub certificate: Vec<u8>,
    pub private_key: Vec<u8>,
    pub chain: Option<Vec<u8>>,
    pub domain_name: String,
    pub not_after: Option<UtcDateTime>,
    pub tags: Vec<(String, String)>,
    pub import_count: u32,
}

#[derive(Debug, Default)]
pub struct InMemoryCertificateStore {
    certificates: Mutex<BTreeMap<String, StoredCertificate>>,
    /// `existing_handle` of every import call, in order
    imports: Mutex<Vec<Option<String>>>,
    import_failure: Mutex<Option<String>>,
}

impl InMemoryCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a certificate under a known handle
    pub fn insert(&self, handle: &str, domain_name: &str, not_after: Option<UtcDateTime>) {
        self.certificates.lock().unwrap().insert(
            handle.to_string(),
            StoredCertificate {
                certificate: Vec::new(),
                private_key: Vec::new(),
                chain: None,
                domain_name: domain_name.to_string(),
                not_after,
                tags: Vec::new(),
                import_count: 0,
            },
        );
    }

    pub fn set_not_after(&self, handle: &str, not_after: Option<UtcDateTime>) {
        if let Some(cert) = self.certificates.lock().unwrap().get_mut(handle) {
            cert.not_after = not_after;
        }
    }

    /// Make every following import fail with an API error
    pub fn fail_imports(&self, reason: &str) {
        *self.import_failure.lock().unwrap() = Some(reason.to_string());
    }

    pub fn get(&self, handle: &str) -> Option<StoredCertificate> {
        self.certificates.lock().unwrap().get(handle).cloned()
    }

    pub fn handles(&self) -> Vec<String> {
        self.certificates.lock().unwrap().keys().cloned().collect()
    }

    pub fn import_calls(&self) -> Vec<Option<String>> {
        self.imports.lock().unwrap().clone()
    }

    pub fn tags(&self, handle: &str) -> Vec<(String, String)> {
        self.get(handle).map(|c| c.tags).unwrap_or_default()
    }

    fn new_handle() -> String {
        format!(
            "arn:aws:acm:us-east-1:000000000000:certificate/{}",
            uuid::Uuid::new_v4()
        )
    }
}

/// Subject CN and notAfter of a PEM certificate, if it parses
fn inspect_pem(pem: &[u8]) -> Option<(Option<String>, UtcDateTime)> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(pem).ok()?;
    let x509 = pem.parse_x509().ok()?;
    let not_after = Utc
        .timestamp_opt(x509.validity().not_after.timestamp(), 0)
        .single()?;
    let common_name = x509
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string);
    Some((common_name, not_after))
}

#[async_trait]
impl ManagedCertificateStore for InMemoryCertificateStore {
    async fn import(&self, request: ImportRequest) -> Result<Option<String>, CertStoreError> {
        self.imports
            .lock()
            .unwrap()
            .push(request.existing_handle.clone());

        if let Some(reason) = self.import_failure.lock().unwrap().clone() {
            return Err(CertStoreError::Api(reason));
        }

        let (common_name, not_after) = match inspect_pem(&request.certificate) {
            Some((cn, not_after)) => (cn, not_after),
            None => (None, Utc::now() + Duration::days(FALLBACK_VALIDITY_DAYS)),
        };

        let mut certificates = self.certificates.lock().unwrap();
        let handle = match request.existing_handle {
            Some(handle) => {
                let cert = certificates
                    .get_mut(&handle)
                    .ok_or_else(|| CertStoreError::NotFound(handle.clone()))?;
                cert.certificate = request.certificate;
                cert.private_key = request.private_key;
                cert.chain = request.chain;
                cert.not_after = Some(not_after);
                if let Some(cn) = common_name {
                    cert.domain_name = cn;
                }
                cert.import_count += 1;
                handle
            }
            None => {
                let handle = Self::new_handle();
                certificates.insert(
                    handle.clone(),
                    StoredCertificate {
                        certificate: request.certificate,
                        private_key: request.private_key,
                        chain: request.chain,
                        domain_name: common_name.unwrap_or_default(),
                        not_after: Some(not_after),
                        tags: Vec::new(),
                        import_count: 1,
                    },
                );
                handle
            }
        };
        Ok(Some(handle))
    }

    async fn describe(&self, handle: &str) -> Result<Option<CertificateDetails>, CertStoreError> {
        Ok(self
            .certificates
            .lock()
            .unwrap()
            .get(handle)
            .map(|cert| CertificateDetails {
                domain_name: cert.domain_name.clone(),
                not_after: cert.not_after,
                status: Some("ISSUED".to_string()),
            }))
    }

    async fn add_tags(&self, handle: &str, tags: &[(String, String)]) -> Result<(), CertStoreError> {
        let mut certificates = self.certificates.lock().unwrap();
        let cert = certificates
            .get_mut(handle)
            .ok_or_else(|| CertStoreError::NotFound(handle.to_string()))?;
        for (key, value) in tags {
            cert.tags.retain(|(k, _)| k != key);
            cert.tags.push((key.clone(), value.clone()));
        }
        Ok(())
    }
}
