//! Runtime configuration
//!
//! Built once at process entry from flags/environment and handed to every component
//! constructor. Nothing below the binary reads the environment directly.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default key of the configuration document inside the bucket
pub const DEFAULT_CONFIG_KEY: &str = "config/domains.json";
/// Default prefix holding the issuance tool's account state
pub const DEFAULT_ACCOUNT_PREFIX: &str = "certbot/config";
/// Default prefix for timestamped PEM backups
pub const DEFAULT_BACKUP_PREFIX: &str = "certificates";
/// Default ephemeral working root
pub const DEFAULT_WORK_ROOT: &str = "/tmp/certsync";
/// Default issuance tool executable
pub const DEFAULT_CERTBOT_PATH: &str = "certbot";
/// Default wall-clock limit for a single issuance tool run
pub const DEFAULT_CERTBOT_TIMEOUT_SECS: u64 = 600;

/// User-provided configuration (every field optional, resolved by [`RuntimeConfig::try_from`])
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfigInput {
    pub bucket: Option<String>,
    pub topic_arn: Option<String>,
    pub config_key: Option<String>,
    pub account_prefix: Option<String>,
    pub backup_prefix: Option<String>,
    pub work_root: Option<PathBuf>,
    pub certbot_path: Option<String>,
    pub certbot_timeout_secs: Option<u64>,
}

/// Validated runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Bucket holding account state, the configuration document and backups
    pub bucket: String,
    /// Notification topic receiving run summaries
    pub topic_arn: String,
    pub config_key: String,
    pub account_prefix: String,
    pub backup_prefix: String,
    pub work_root: PathBuf,
    pub certbot_path: String,
    pub certbot_timeout: Duration,
}

impl TryFrom<RuntimeConfigInput> for RuntimeConfig {
    type Error = CoreError;

    fn try_from(input: RuntimeConfigInput) -> Result<Self, Self::Error> {
        let mut missing = Vec::new();

        let bucket = non_blank(input.bucket);
        if bucket.is_none() {
            missing.push("CERTSYNC_BUCKET");
        }
        let topic_arn = non_blank(input.topic_arn);
        if topic_arn.is_none() {
            missing.push("CERTSYNC_TOPIC_ARN");
        }

        let (Some(bucket), Some(topic_arn)) = (bucket, topic_arn) else {
            return Err(CoreError::Precondition(format!(
                "missing required configuration: {}",
                missing.join(", ")
            )));
        };

        let certbot_timeout_secs = input
            .certbot_timeout_secs
            .unwrap_or(DEFAULT_CERTBOT_TIMEOUT_SECS);
        if certbot_timeout_secs == 0 {
            return Err(CoreError::Precondition(
                "certbot timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            bucket,
            topic_arn,
            config_key: non_blank(input.config_key)
                .unwrap_or_else(|| DEFAULT_CONFIG_KEY.to_string()),
            account_prefix: non_blank(input.account_prefix)
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_ACCOUNT_PREFIX.to_string()),
            backup_prefix: non_blank(input.backup_prefix)
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BACKUP_PREFIX.to_string()),
            work_root: input
                .work_root
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_ROOT)),
            certbot_path: non_blank(input.certbot_path)
                .unwrap_or_else(|| DEFAULT_CERTBOT_PATH.to_string()),
            certbot_timeout: Duration::from_secs(certbot_timeout_secs),
        })
    }
}

impl RuntimeConfig {
    /// Minimal configuration for tests and local tooling
    pub fn new(bucket: impl Into<String>, topic_arn: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            topic_arn: topic_arn.into(),
            config_key: DEFAULT_CONFIG_KEY.to_string(),
            account_prefix: DEFAULT_ACCOUNT_PREFIX.to_string(),
            backup_prefix: DEFAULT_BACKUP_PREFIX.to_string(),
            work_root: PathBuf::from(DEFAULT_WORK_ROOT),
            certbot_path: DEFAULT_CERTBOT_PATH.to_string(),
            certbot_timeout: Duration::from_secs(DEFAULT_CERTBOT_TIMEOUT_SECS),
        }
    }

    pub fn with_work_root(mut self, work_root: impl Into<PathBuf>) -> Self {
        self.work_root = work_root.into();
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
