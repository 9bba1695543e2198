//! Argument vectors for the issuance tool
//!
//! Every value is its own token; nothing here is ever handed to a shell.

use std::path::{Path, PathBuf};

use certsync_core::{utils, CertificateEntry, KeyAlgorithm};
use serde::{Deserialize, Serialize};

/// Hosted zone hint exported to the child process only
///
/// Upstream certbot-dns-route53 finds the zone itself through `ListHostedZones` and has no
/// zone option, so this is only honoured by wrappers that read it.
pub const HOSTED_ZONE_ENV: &str = "AWS_HOSTED_ZONE_ID";

/// The ephemeral directories handed to the tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingTree {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub work_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl WorkingTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_dir: root.join("config"),
            work_dir: root.join("work"),
            logs_dir: root.join("logs"),
            root,
        }
    }

    /// Directory holding one subdirectory per lineage
    pub fn live_dir(&self) -> PathBuf {
        self.config_dir.join("live")
    }

    pub fn all_dirs(&self) -> [&Path; 3] {
        [
            self.config_dir.as_path(),
            self.work_dir.as_path(),
            self.logs_dir.as_path(),
        ]
    }

    fn directory_args(&self) -> Vec<String> {
        vec![
            "--config-dir".to_string(),
            self.config_dir.display().to_string(),
            "--work-dir".to_string(),
            self.work_dir.display().to_string(),
            "--logs-dir".to_string(),
            self.logs_dir.display().to_string(),
        ]
    }
}

/// Account registration with external account binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub server_url: String,
    pub eab_kid: Option<String>,
    pub eab_hmac_key: Option<String>,
}

impl RegisterRequest {
    pub fn to_args(&self, tree: &WorkingTree) -> Vec<String> {
        let mut args = vec![
            "register".to_string(),
            "--non-interactive".to_string(),
            "--agree-tos".to_string(),
            "--no-eff-email".to_string(),
            "--email".to_string(),
            self.email.clone(),
            "--server".to_string(),
            self.server_url.clone(),
        ];
        if let (Some(kid), Some(hmac)) = (&self.eab_kid, &self.eab_hmac_key) {
            args.extend([
                "--eab-kid".to_string(),
                kid.clone(),
                "--eab-hmac-key".to_string(),
                hmac.clone(),
            ]);
        }
        args.extend(tree.directory_args());
        args
    }
}

/// Certificate acquisition via DNS-01
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObtainRequest {
    pub domains: Vec<String>,
    pub email: String,
    pub server_url: String,
    pub dns_zone_id: Option<String>,
    pub force_renewal: bool,
    pub key_algorithm: KeyAlgorithm,
    pub rsa_key_size: Option<u16>,
    /// Pins the output directory name
    pub lineage_name: String,
}

impl ObtainRequest {
    pub fn for_entry(entry: &CertificateEntry, force_renewal: bool) -> Self {
        Self {
            domains: entry.domains.clone(),
            email: entry.contact_email.clone(),
            server_url: entry.directory_url().to_string(),
            dns_zone_id: entry.dns_zone_id.clone(),
            force_renewal,
            key_algorithm: entry.key_algorithm,
            rsa_key_size: entry.rsa_key_size,
            lineage_name: utils::lineage_name(entry.primary_domain()),
        }
    }

    pub fn primary_domain(&self) -> Option<&str> {
        self.domains.first().map(String::as_str)
    }

    pub fn to_args(&self, tree: &WorkingTree) -> Vec<String> {
        let mut args = vec![
            "certonly".to_string(),
            "--non-interactive".to_string(),
            "--agree-tos".to_string(),
            "--no-eff-email".to_string(),
            "--dns-route53".to_string(),
            "--email".to_string(),
            self.email.clone(),
            "--server".to_string(),
            self.server_url.clone(),
            "--cert-name".to_string(),
            self.lineage_name.clone(),
            "--key-type".to_string(),
            self.key_algorithm.to_string(),
        ];
        if let (KeyAlgorithm::Rsa, Some(size)) = (self.key_algorithm, self.rsa_key_size) {
            args.extend(["--rsa-key-size".to_string(), size.to_string()]);
        }
        if self.force_renewal {
            args.push("--force-renewal".to_string());
        }
        args.extend(tree.directory_args());
        for domain in &self.domains {
            args.extend(["-d".to_string(), domain.clone()]);
        }
        args
    }

    pub fn to_env(&self) -> Vec<(String, String)> {
        self.dns_zone_id
            .iter()
            .map(|zone| (HOSTED_ZONE_ENV.to_string(), zone.clone()))
            .collect()
    }
}
