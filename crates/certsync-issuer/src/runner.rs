use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use certsync_core::RuntimeConfig;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::command::{ObtainRequest, RegisterRequest, WorkingTree};
use crate::errors::IssuerError;
use crate::executor::{CommandExecutor, CommandInvocation, CommandOutput, TokioCommandExecutor};
use crate::resolver::{CertificatePaths, OutputResolver};

/// Operations the orchestrator needs from an ACME client
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    /// Local directory holding the client's account state, mirrored to durable storage
    fn account_state_dir(&self) -> PathBuf;

    /// Create the working tree; safe to call repeatedly
    async fn initialize(&self) -> Result<(), IssuerError>;

    async fn register_account(&self, request: &RegisterRequest) -> Result<(), IssuerError>;

    async fn obtain(&self, request: &ObtainRequest) -> Result<CertificatePaths, IssuerError>;

    /// Remove the working tree. Never fails.
    async fn cleanup(&self);
}

pub struct CertbotRunner {
    program: String,
    tree: WorkingTree,
    timeout: Duration,
    executor: Arc<dyn CommandExecutor>,
    resolver: OutputResolver,
}

impl CertbotRunner {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self::with_executor(config, Arc::new(TokioCommandExecutor))
    }

    pub fn with_executor(config: &RuntimeConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            program: config.certbot_path.clone(),
            tree: WorkingTree::new(&config.work_root),
            timeout: config.certbot_timeout,
            executor,
            resolver: OutputResolver::default(),
        }
    }

    pub fn working_tree(&self) -> &WorkingTree {
        &self.tree
    }

    async fn run(
        &self,
        operation: &str,
        args: Vec<String>,
        envs: Vec<(String, String)>,
    ) -> Result<CommandOutput, IssuerError> {
        let invocation = CommandInvocation {
            program: self.program.clone(),
            args,
            envs,
            timeout: self.timeout,
        };

        let output = self.executor.execute(&invocation).await?;
        debug!("{} stdout:\n{}", operation, output.stdout);

        if !output.success() {
            error!(
                "{} exited with {:?}; stderr:\n{}",
                operation, output.exit_code, output.stderr
            );
            return Err(IssuerError::Issuance {
                operation: operation.to_string(),
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl CertificateIssuer for CertbotRunner {
    fn account_state_dir(&self) -> PathBuf {
        self.tree.config_dir.clone()
    }

    async fn initialize(&self) -> Result<(), IssuerError> {
        for dir in self.tree.all_dirs() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| IssuerError::io(dir, e))?;
        }
        debug!("Working tree ready at {}", self.tree.root.display());
        Ok(())
    }

    async fn register_account(&self, request: &RegisterRequest) -> Result<(), IssuerError> {
        info!(
            "Registering ACME account for {} at {}",
            request.email, request.server_url
        );
        self.initialize().await?;
        self.run("register", request.to_args(&self.tree), Vec::new())
            .await?;
        info!("ACME account registered for {}", request.email);
        Ok(())
    }

    async fn obtain(&self, request: &ObtainRequest) -> Result<CertificatePaths, IssuerError> {
        info!(
            "Requesting certificate for {:?} from {} (lineage {}, force_renewal={})",
            request.domains, request.server_url, request.lineage_name, request.force_renewal
        );
        self.initialize().await?;

        let output = self
            .run("certonly", request.to_args(&self.tree), request.to_env())
            .await?;

        let ctx = OutputResolver::context(
            &request.lineage_name,
            &self.tree.live_dir(),
            &output.combined(),
        )
        .await?;
        self.resolver.resolve(&ctx).await
    }

    async fn cleanup(&self) {
        match fs::remove_dir_all(&self.tree.root).await {
            Ok(()) => debug!("Removed working tree {}", self.tree.root.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove working tree {}: {}",
                self.tree.root.display(),
                e
            ),
        }
    }
}
