//! Configuration document model
//!
//! Entries are kept exactly as written (`EntrySpec`, every field optional) so that a
//! write-back never materialises defaults into the document. A [`CertificateEntry`] is the
//! resolved, validated view used by the renewal pipeline.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const DOCUMENT_VERSION: &str = "1.0";
pub const DEFAULT_RENEWAL_THRESHOLD_DAYS: u32 = 30;
pub const DEFAULT_RSA_KEY_SIZE: u16 = 2048;
pub const SUPPORTED_RSA_KEY_SIZES: [u16; 2] = [2048, 4096];

pub const LETSENCRYPT_DIRECTORY_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";
pub const ZEROSSL_DIRECTORY_URL: &str = "https://acme.zerossl.com/v2/DV90";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcmeProvider {
    Letsencrypt,
    Zerossl,
    /// Directory URL supplied explicitly by the entry
    Custom,
}

impl AcmeProvider {
    /// Directory URL of a named provider, `None` for custom
    pub fn directory_url(&self) -> Option<&'static str> {
        match self {
            AcmeProvider::Letsencrypt => Some(LETSENCRYPT_DIRECTORY_URL),
            AcmeProvider::Zerossl => Some(ZEROSSL_DIRECTORY_URL),
            AcmeProvider::Custom => None,
        }
    }
}

impl fmt::Display for AcmeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcmeProvider::Letsencrypt => write!(f, "letsencrypt"),
            AcmeProvider::Zerossl => write!(f, "zerossl"),
            AcmeProvider::Custom => write!(f, "custom"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    Rsa,
    Ecdsa,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Rsa => write!(f, "rsa"),
            KeyAlgorithm::Ecdsa => write!(f, "ecdsa"),
        }
    }
}

/// Document-level defaults filling fields an entry omits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acme_provider: Option<AcmeProvider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acme_server_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_zone_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_threshold_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<KeyAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsa_key_size: Option<u16>,
}

/// One entry as stored in the configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySpec {
    pub id: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acme_provider: Option<AcmeProvider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acme_server_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_zone_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_threshold_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<KeyAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsa_key_size: Option<u16>,
    /// Fields this version does not know about, carried through write-backs untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Resolved, validated certificate lineage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateEntry {
    pub id: String,
    /// First domain is the primary one
    pub domains: Vec<String>,
    pub contact_email: String,
    pub provider: AcmeProvider,
    /// Only set for [`AcmeProvider::Custom`]
    pub issuer_server_url: Option<String>,
    /// Hosted zone for the DNS plugin; the plugin discovers it when absent
    pub dns_zone_id: Option<String>,
    pub store_handle: Option<String>,
    pub renewal_threshold_days: u32,
    pub enabled: bool,
    pub key_algorithm: KeyAlgorithm,
    /// Only set for [`KeyAlgorithm::Rsa`]
    pub rsa_key_size: Option<u16>,
}

impl CertificateEntry {
    pub fn primary_domain(&self) -> &str {
        // domains is non-empty by construction
        &self.domains[0]
    }

    /// ACME directory URL this entry is issued against
    pub fn directory_url(&self) -> &str {
        match self.provider.directory_url() {
            Some(url) => url,
            None => self.issuer_server_url.as_deref().unwrap_or_default(),
        }
    }
}

/// The full durable list of managed certificates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub defaults: EntryDefaults,
    #[serde(default)]
    pub entries: Vec<EntrySpec>,
}

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

impl Default for ConfigurationDocument {
    fn default() -> Self {
        Self {
            version: default_version(),
            defaults: EntryDefaults::default(),
            entries: Vec::new(),
        }
    }
}

impl ConfigurationDocument {
    /// Parse a document and check that entry ids are unique
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let document: ConfigurationDocument = serde_json::from_str(text)?;
        document.check_unique_ids()?;
        Ok(document)
    }

    pub fn to_json_pretty(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn check_unique_ids(&self) -> Result<(), CoreError> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if entry.id.trim().is_empty() {
                return Err(CoreError::InvalidDocument(
                    "entry with empty id".to_string(),
                ));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(CoreError::InvalidDocument(format!(
                    "duplicate entry id '{}'",
                    entry.id
                )));
            }
        }
        Ok(())
    }

    pub fn find(&self, id: &str) -> Option<&EntrySpec> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Merge an entry over the document defaults and validate the result
    pub fn resolve(&self, spec: &EntrySpec) -> Result<CertificateEntry, CoreError> {
        let defaults = &self.defaults;
        let id = spec.id.trim().to_string();
        if id.is_empty() {
            return Err(CoreError::invalid_entry("<unnamed>", "id must not be empty"));
        }

        let domains: Vec<String> = spec
            .domains
            .iter()
            .map(|d| d.trim().to_lowercase())
            .collect();
        if domains.is_empty() {
            return Err(CoreError::invalid_entry(&id, "domains must not be empty"));
        }
        if domains.iter().any(|d| d.is_empty()) {
            return Err(CoreError::invalid_entry(&id, "domains must not contain blanks"));
        }

        let contact_email = spec
            .email
            .clone()
            .or_else(|| defaults.email.clone())
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| CoreError::invalid_entry(&id, "contact email is required"))?;
        if !contact_email.contains('@') {
            return Err(CoreError::invalid_entry(
                &id,
                format!("contact email '{}' is not an address", contact_email),
            ));
        }

        let provider = spec
            .acme_provider
            .or(defaults.acme_provider)
            .unwrap_or(AcmeProvider::Letsencrypt);
        let server_url = spec
            .acme_server_url
            .clone()
            .or_else(|| defaults.acme_server_url.clone())
            .filter(|u| !u.trim().is_empty());
        let issuer_server_url = match (provider, server_url) {
            (AcmeProvider::Custom, Some(url)) => {
                validate_directory_url(&id, &url)?;
                Some(url)
            }
            (AcmeProvider::Custom, None) => {
                return Err(CoreError::invalid_entry(
                    &id,
                    "acmeServerUrl is required when acmeProvider is custom",
                ));
            }
            (named, Some(_)) => {
                return Err(CoreError::invalid_entry(
                    &id,
                    format!("acmeServerUrl must not be set for provider {}", named),
                ));
            }
            (_, None) => None,
        };

        let key_algorithm = spec
            .key_type
            .or(defaults.key_type)
            .unwrap_or(KeyAlgorithm::Rsa);
        let rsa_key_size = match key_algorithm {
            KeyAlgorithm::Rsa => {
                let size = spec
                    .rsa_key_size
                    .or(defaults.rsa_key_size)
                    .unwrap_or(DEFAULT_RSA_KEY_SIZE);
                if !SUPPORTED_RSA_KEY_SIZES.contains(&size) {
                    return Err(CoreError::invalid_entry(
                        &id,
                        format!("unsupported RSA key size {}", size),
                    ));
                }
                Some(size)
            }
            KeyAlgorithm::Ecdsa => {
                if spec.rsa_key_size.is_some() {
                    return Err(CoreError::invalid_entry(
                        &id,
                        "rsaKeySize is only meaningful for RSA keys",
                    ));
                }
                None
            }
        };

        Ok(CertificateEntry {
            id,
            domains,
            contact_email,
            provider,
            issuer_server_url,
            dns_zone_id: spec
                .dns_zone_id
                .clone()
                .or_else(|| defaults.dns_zone_id.clone())
                .filter(|z| !z.trim().is_empty()),
            store_handle: spec.certificate_arn.clone().filter(|h| !h.is_empty()),
            renewal_threshold_days: spec
                .renewal_threshold_days
                .or(defaults.renewal_threshold_days)
                .unwrap_or(DEFAULT_RENEWAL_THRESHOLD_DAYS),
            enabled: spec.enabled.or(defaults.enabled).unwrap_or(true),
            key_algorithm,
            rsa_key_size,
        })
    }

    /// Resolve every entry in document order
    pub fn resolve_all(&self) -> Vec<(String, Result<CertificateEntry, CoreError>)> {
        self.entries
            .iter()
            .map(|spec| (spec.id.clone(), self.resolve(spec)))
            .collect()
    }

    /// Record a new store handle for an entry. Returns false when the id is unknown
    /// or the handle is unchanged.
    pub fn set_store_handle(&mut self, id: &str, handle: &str) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) if entry.certificate_arn.as_deref() != Some(handle) => {
                entry.certificate_arn = Some(handle.to_string());
                true
            }
            _ => false,
        }
    }

    /// Replace the entry with the same id, or append. Returns true when appended.
    pub fn upsert(&mut self, spec: EntrySpec) -> bool {
        match self.entries.iter_mut().find(|e| e.id == spec.id) {
            Some(existing) => {
                let extra = std::mem::take(&mut existing.extra);
                *existing = EntrySpec { extra, ..spec };
                false
            }
            None => {
                self.entries.push(spec);
                true
            }
        }
    }
}

fn validate_directory_url(id: &str, raw: &str) -> Result<(), CoreError> {
    let parsed = url::Url::parse(raw).map_err(|e| {
        CoreError::invalid_entry(id, format!("invalid acmeServerUrl '{}': {}", raw, e))
    })?;
    match parsed.scheme() {
        "https" | "http" => Ok(()),
        other => Err(CoreError::invalid_entry(
            id,
            format!("unsupported acmeServerUrl scheme '{}'", other),
        )),
    }
}
