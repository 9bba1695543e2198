//! Invocation payloads and the structured response

use certsync_core::{KeyAlgorithm, RenewalResult, RunSummary};
use serde::{Deserialize, Serialize};

/// One invocation, discriminated by `mode`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum InvocationRequest {
    Register(RegisterPayload),
    #[serde(alias = "certonly")]
    AcquireOnDemand(AcquirePayload),
    Renew(RenewPayload),
}

impl InvocationRequest {
    pub fn mode(&self) -> &'static str {
        match self {
            InvocationRequest::Register(_) => "register",
            InvocationRequest::AcquireOnDemand(_) => "acquire-on-demand",
            InvocationRequest::Renew(_) => "renew",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub email: String,
    pub server: String,
    #[serde(
        default,
        rename = "externalBindingKeyID",
        alias = "externalBindingKeyId",
        skip_serializing_if = "Option::is_none"
    )]
    pub eab_kid: Option<String>,
    #[serde(
        default,
        rename = "externalBindingKey",
        skip_serializing_if = "Option::is_none"
    )]
    pub eab_hmac_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquirePayload {
    pub domains: Vec<String>,
    pub email: String,
    pub server: String,
    #[serde(
        default,
        rename = "dnsZoneID",
        alias = "dnsZoneId",
        skip_serializing_if = "Option::is_none"
    )]
    pub dns_zone_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_algorithm: Option<KeyAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsa_key_size: Option<u16>,
    #[serde(default)]
    pub force_renewal: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewPayload {
    /// Only entries with these ids are processed; others are skipped silently
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_ids: Option<Vec<String>>,
    #[serde(default)]
    pub dry_run: bool,
}

impl RenewPayload {
    pub fn includes(&self, id: &str) -> bool {
        self.certificate_ids
            .as_ref()
            .map_or(true, |ids| ids.iter().any(|i| i == id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    pub message: String,
    pub results: Vec<RenewalResult>,
    #[serde(flatten)]
    pub summary: RunSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    pub body: ResponseBody,
}

impl InvocationResponse {
    pub fn ok(message: impl Into<String>, results: Vec<RenewalResult>) -> Self {
        Self::new(200, message, results)
    }

    pub fn failed(message: impl Into<String>, results: Vec<RenewalResult>) -> Self {
        Self::new(500, message, results)
    }

    fn new(status_code: u16, message: impl Into<String>, results: Vec<RenewalResult>) -> Self {
        Self {
            status_code,
            body: ResponseBody {
                message: message.into(),
                summary: RunSummary::from_results(&results),
                results,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}
