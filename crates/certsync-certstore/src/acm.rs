//! AWS Certificate Manager backend

use async_trait::async_trait;
use aws_sdk_acm::error::ProvideErrorMetadata;
use aws_sdk_acm::primitives::Blob;
use aws_sdk_acm::types::Tag;
use aws_sdk_acm::Client as AcmClient;
use chrono::DateTime;
use tracing::debug;

use crate::errors::CertStoreError;
use crate::store::{CertificateDetails, ImportRequest, ManagedCertificateStore};

pub struct AcmCertificateStore {
    client: AcmClient,
}

impl AcmCertificateStore {
    pub fn new(client: AcmClient) -> Self {
        Self { client }
    }
}

fn api_error<E: ProvideErrorMetadata + std::fmt::Display>(action: &str, e: &E) -> CertStoreError {
    CertStoreError::Api(format!(
        "{} failed: {}",
        action,
        e.message().map(str::to_string).unwrap_or_else(|| e.to_string())
    ))
}

#[async_trait]
impl ManagedCertificateStore for AcmCertificateStore {
    async fn import(&self, request: ImportRequest) -> Result<Option<String>, CertStoreError> {
        let reimport = request.existing_handle.is_some();
        let response = self
            .client
            .import_certificate()
            .certificate(Blob::new(request.certificate))
            .private_key(Blob::new(request.private_key))
            .set_certificate_chain(request.chain.map(Blob::new))
            .set_certificate_arn(request.existing_handle)
            .send()
            .await
            .map_err(|e| api_error("ImportCertificate", &e))?;

        let handle = response.certificate_arn().map(str::to_string);
        debug!("ImportCertificate (reimport={}) returned {:?}", reimport, handle);
        Ok(handle)
    }

    async fn describe(&self, handle: &str) -> Result<Option<CertificateDetails>, CertStoreError> {
        let response = match self
            .client
            .describe_certificate()
            .certificate_arn(handle)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                if e
                    .as_service_error()
                    .map(|se| se.is_resource_not_found_exception())
                    .unwrap_or(false)
                {
                    debug!("Certificate {} not found in ACM", handle);
                    return Ok(None);
                }
                return Err(api_error("DescribeCertificate", &e));
            }
        };

        Ok(response.certificate().map(|detail| CertificateDetails {
            domain_name: detail.domain_name().unwrap_or_default().to_string(),
            not_after: detail
                .not_after()
                .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
            status: detail.status().map(|s| s.as_str().to_string()),
        }))
    }

    async fn add_tags(&self, handle: &str, tags: &[(String, String)]) -> Result<(), CertStoreError> {
        let tags = tags
            .iter()
            .map(|(key, value)| {
                Tag::builder()
                    .key(key)
                    .value(value)
                    .build()
                    .map_err(|e| CertStoreError::Api(format!("Invalid tag {}: {}", key, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.client
            .add_tags_to_certificate()
            .certificate_arn(handle)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(|e| api_error("AddTagsToCertificate", &e))?;
        Ok(())
    }
}
