#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use certsync_certstore::test_utils::InMemoryCertificateStore;
use certsync_core::RuntimeConfig;
use certsync_issuer::{
    CertbotRunner, CommandExecutor, CommandInvocation, CommandOutput, IssuerError,
};
use certsync_notifications::test_utils::RecordingNotifier;
use certsync_renewal::RenewalOrchestrator;
use certsync_storage::test_utils::InMemoryObjectStore;

/// Stands in for certbot: writes the files a real run would and prints its "saved at" lines
#[derive(Default)]
pub struct ScriptedCertbot {
    invocations: Mutex<Vec<CommandInvocation>>,
    failing_domains: HashSet<String>,
}

impl ScriptedCertbot {
    pub fn failing_for(domains: &[&str]) -> Self {
        Self {
            failing_domains: domains.iter().map(|d| d.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn certonly_calls(&self) -> Vec<CommandInvocation> {
        self.invocations()
            .into_iter()
            .filter(|i| i.args.first().map(String::as_str) == Some("certonly"))
            .collect()
    }

    fn flag<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    fn domains(args: &[String]) -> Vec<String> {
        args.windows(2)
            .filter(|w| w[0] == "-d")
            .map(|w| w[1].clone())
            .collect()
    }

    fn certonly(&self, args: &[String]) -> CommandOutput {
        let domains = Self::domains(args);
        if let Some(bad) = domains.iter().find(|d| self.failing_domains.contains(*d)) {
            return CommandOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: format!(
                    "Certbot failed to authenticate some domains\n  Domain: {}\n  Detail: DNS problem: NXDOMAIN\n",
                    bad
                ),
            };
        }

        let config_dir = PathBuf::from(Self::flag(args, "--config-dir").unwrap_or_default());
        let lineage = Self::flag(args, "--cert-name").unwrap_or_default();
        let live = config_dir.join("live").join(lineage);
        std::fs::create_dir_all(&live).unwrap();
        for name in ["cert.pem", "chain.pem", "fullchain.pem", "privkey.pem"] {
            std::fs::write(
                live.join(name),
                format!("-----{} for {}-----\n", name, domains.join(",")),
            )
            .unwrap();
        }

        CommandOutput {
            exit_code: Some(0),
            stdout: format!(
                "Successfully received certificate.\nCertificate is saved at: {}\nKey is saved at:         {}\n",
                live.join("fullchain.pem").display(),
                live.join("privkey.pem").display()
            ),
            stderr: String::new(),
        }
    }

    fn register(&self, args: &[String]) -> CommandOutput {
        let config_dir = PathBuf::from(Self::flag(args, "--config-dir").unwrap_or_default());
        let account = config_dir.join("accounts/acme.example/directory/abc123");
        std::fs::create_dir_all(&account).unwrap();
        std::fs::write(account.join("regr.json"), r#"{"body": {}}"#).unwrap();
        CommandOutput {
            exit_code: Some(0),
            stdout: "Account registered.\n".to_string(),
            stderr: String::new(),
        }
    }
}

#[async_trait]
impl CommandExecutor for ScriptedCertbot {
    async fn execute(&self, invocation: &CommandInvocation) -> Result<CommandOutput, IssuerError> {
        self.invocations.lock().unwrap().push(invocation.clone());
        let output = match invocation.args.first().map(String::as_str) {
            Some("certonly") => self.certonly(&invocation.args),
            Some("register") => self.register(&invocation.args),
            other => CommandOutput {
                exit_code: Some(2),
                stdout: String::new(),
                stderr: format!("unexpected subcommand {:?}", other),
            },
        };
        Ok(output)
    }
}

pub struct Harness {
    pub orchestrator: RenewalOrchestrator,
    pub certbot: Arc<ScriptedCertbot>,
    pub objects: Arc<InMemoryObjectStore>,
    pub certificates: Arc<InMemoryCertificateStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub work_root: PathBuf,
    _tmp: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_certbot(ScriptedCertbot::default())
    }

    pub fn with_certbot(certbot: ScriptedCertbot) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let work_root = tmp.path().join("certsync");
        let config = RuntimeConfig::new("certs-bucket", "arn:aws:sns:us-east-1:000000000000:certs")
            .with_work_root(&work_root);

        let certbot = Arc::new(certbot);
        let objects = Arc::new(InMemoryObjectStore::new());
        let certificates = Arc::new(InMemoryCertificateStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let runner = CertbotRunner::with_executor(&config, certbot.clone());

        let orchestrator = RenewalOrchestrator::new(
            config,
            Arc::new(runner),
            objects.clone(),
            certificates.clone(),
            notifier.clone(),
        );

        Self {
            orchestrator,
            certbot,
            objects,
            certificates,
            notifier,
            work_root,
            _tmp: tmp,
        }
    }

    pub fn put_document(&self, value: serde_json::Value) {
        self.objects.insert(
            "config/domains.json",
            serde_json::to_string_pretty(&value).unwrap().as_bytes(),
        );
    }

    pub fn document(&self) -> Option<serde_json::Value> {
        self.objects
            .text("config/domains.json")
            .map(|t| serde_json::from_str(&t).unwrap())
    }

    pub fn work_root_exists(&self) -> bool {
        Path::new(&self.work_root).exists()
    }
}
