//! Runtime settings and AWS wiring

use std::path::PathBuf;
use std::sync::Arc;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use certsync_certstore::AcmCertificateStore;
use certsync_core::{Notifier, RuntimeConfig, RuntimeConfigInput};
use certsync_issuer::CertbotRunner;
use certsync_notifications::{LogNotifier, SnsNotifier};
use certsync_renewal::RenewalOrchestrator;
use certsync_storage::S3ObjectStore;
use clap::Args;
use tracing::info;

#[derive(Args, Clone, Debug, Default)]
pub struct SettingsArgs {
    /// Bucket holding account state, the configuration document and backups
    #[arg(long, env = "CERTSYNC_BUCKET")]
    pub bucket: Option<String>,

    /// SNS topic receiving run summaries
    #[arg(long, env = "CERTSYNC_TOPIC_ARN")]
    pub topic_arn: Option<String>,

    /// Object key of the configuration document
    #[arg(long, env = "CERTSYNC_CONFIG_KEY")]
    pub config_key: Option<String>,

    /// Prefix mirroring the certbot config directory
    #[arg(long, env = "CERTSYNC_ACCOUNT_PREFIX")]
    pub account_prefix: Option<String>,

    /// Prefix for timestamped PEM backups
    #[arg(long, env = "CERTSYNC_BACKUP_PREFIX")]
    pub backup_prefix: Option<String>,

    /// Ephemeral working tree for certbot
    #[arg(long, env = "CERTSYNC_WORK_ROOT")]
    pub work_root: Option<PathBuf>,

    /// certbot executable
    #[arg(long, env = "CERTSYNC_CERTBOT_PATH")]
    pub certbot_path: Option<String>,

    /// Seconds before a certbot run is killed
    #[arg(long, env = "CERTSYNC_CERTBOT_TIMEOUT_SECS")]
    pub certbot_timeout_secs: Option<u64>,

    /// AWS region override
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Custom AWS endpoint (e.g. LocalStack)
    #[arg(long, env = "CERTSYNC_AWS_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,
}

impl SettingsArgs {
    /// Validate into a [`RuntimeConfig`]; fails before anything is touched
    pub fn runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let config = RuntimeConfig::try_from(RuntimeConfigInput {
            bucket: self.bucket.clone(),
            topic_arn: self.topic_arn.clone(),
            config_key: self.config_key.clone(),
            account_prefix: self.account_prefix.clone(),
            backup_prefix: self.backup_prefix.clone(),
            work_root: self.work_root.clone(),
            certbot_path: self.certbot_path.clone(),
            certbot_timeout_secs: self.certbot_timeout_secs,
        })?;
        Ok(config)
    }

    async fn sdk_config(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint_url) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        loader.load().await
    }

    /// Wire the orchestrator against S3, ACM and either SNS or the log
    pub async fn build_orchestrator(
        &self,
        config: RuntimeConfig,
        notify: bool,
    ) -> anyhow::Result<RenewalOrchestrator> {
        let sdk_config = self.sdk_config().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.endpoint_url.is_some())
            .build();
        let objects = S3ObjectStore::new(aws_sdk_s3::Client::from_conf(s3_config), &config.bucket);
        let certificates = AcmCertificateStore::new(aws_sdk_acm::Client::new(&sdk_config));
        let notifier: Arc<dyn Notifier> = if notify {
            Arc::new(SnsNotifier::new(
                aws_sdk_sns::Client::new(&sdk_config),
                &config.topic_arn,
            ))
        } else {
            Arc::new(LogNotifier)
        };
        let runner = CertbotRunner::new(&config);

        info!(
            "Using bucket {} (config {}, account state {}/, backups {}/), work root {}",
            config.bucket,
            config.config_key,
            config.account_prefix,
            config.backup_prefix,
            config.work_root.display()
        );

        Ok(RenewalOrchestrator::new(
            config,
            Arc::new(runner),
            Arc::new(objects),
            Arc::new(certificates),
            notifier,
        ))
    }
}
