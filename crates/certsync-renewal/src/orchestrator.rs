use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use certsync_certstore::{CertificateManager, ManagedCertificateStore};
use certsync_core::entry::DEFAULT_RENEWAL_THRESHOLD_DAYS;
use certsync_core::{
    publish_quietly, utils, AcmeProvider, CertificateEntry, ConfigurationDocument, EntrySpec,
    Notifier, RenewalResult, RuntimeConfig, UtcDateTime,
};
use certsync_issuer::{CertificateIssuer, ObtainRequest, RegisterRequest};
use certsync_notifications::{acquire_message, register_message, renew_message};
use certsync_storage::{ObjectStore, StateSync};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::backup::backup_artifacts;
use crate::errors::RenewalError;
use crate::invocation::{
    AcquirePayload, InvocationRequest, InvocationResponse, RegisterPayload, RenewPayload,
};
use crate::state::{RenewalState, RenewalTracker};

const ACCOUNT_RESULT_ID: &str = "account";
const RENEWAL_RUN_RESULT_ID: &str = "renewal-run";

/// Handle and expiry of a freshly imported certificate
struct Issued {
    handle: String,
    expiry: Option<UtcDateTime>,
}

/// Work run between pulling and pushing account state
struct Synced<T> {
    work: Result<T, RenewalError>,
    /// Set when the account state could not be pushed afterwards
    push_error: Option<RenewalError>,
}

impl<T> Synced<T> {
    /// A push failure only fails work that otherwise succeeded
    fn into_result(self) -> Result<T, RenewalError> {
        match (self.work, self.push_error) {
            (Ok(_), Some(e)) => Err(e),
            (work, _) => work,
        }
    }
}

/// Per-entry results of a renewal pass and the fate of the document write-back
struct RenewPass {
    results: Vec<RenewalResult>,
    write_back: Result<(), RenewalError>,
}

pub struct RenewalOrchestrator {
    config: RuntimeConfig,
    issuer: Arc<dyn CertificateIssuer>,
    sync: StateSync,
    certificates: CertificateManager,
    notifier: Arc<dyn Notifier>,
}

impl RenewalOrchestrator {
    pub fn new(
        config: RuntimeConfig,
        issuer: Arc<dyn CertificateIssuer>,
        object_store: Arc<dyn ObjectStore>,
        certificate_store: Arc<dyn ManagedCertificateStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            issuer,
            sync: StateSync::new(object_store),
            certificates: CertificateManager::new(certificate_store),
            notifier,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run one invocation to completion. Never fails: errors become a 500 response.
    pub async fn handle(&self, request: InvocationRequest) -> InvocationResponse {
        info!("Handling {} invocation", request.mode());
        let response = match request {
            InvocationRequest::Register(payload) => self.register(payload).await,
            InvocationRequest::AcquireOnDemand(payload) => self.acquire(payload).await,
            InvocationRequest::Renew(payload) => self.renew(payload).await,
        };
        info!(
            "Invocation finished with status {}: {}",
            response.status_code, response.body.message
        );
        response
    }

    async fn register(&self, payload: RegisterPayload) -> InvocationResponse {
        let outcome = self
            .with_account_state(|| self.register_account(&payload))
            .await
            .into_result();

        match outcome {
            Ok(()) => {
                publish_quietly(
                    self.notifier.as_ref(),
                    register_message(&payload.email, &payload.server, None),
                )
                .await;
                InvocationResponse::ok(
                    format!("ACME account registered for {}", payload.email),
                    Vec::new(),
                )
            }
            Err(e) => {
                error!("Account registration failed: {}", e);
                let message = e.to_string();
                publish_quietly(
                    self.notifier.as_ref(),
                    register_message(&payload.email, &payload.server, Some(&message)),
                )
                .await;
                InvocationResponse::failed(
                    format!("Account registration failed: {}", message),
                    vec![RenewalResult::failure(ACCOUNT_RESULT_ID, &[], message)],
                )
            }
        }
    }

    async fn register_account(&self, payload: &RegisterPayload) -> Result<(), RenewalError> {
        if payload.email.trim().is_empty() || !payload.email.contains('@') {
            return Err(RenewalError::InvalidRequest(format!(
                "'{}' is not a contact email",
                payload.email
            )));
        }
        if payload.server.trim().is_empty() {
            return Err(RenewalError::InvalidRequest(
                "server must not be empty".to_string(),
            ));
        }
        if payload.eab_kid.is_some() != payload.eab_hmac_key.is_some() {
            warn!("Only one half of the external account binding was supplied; ignoring it");
        }

        let request = RegisterRequest {
            email: payload.email.trim().to_string(),
            server_url: payload.server.trim().to_string(),
            eab_kid: payload.eab_kid.clone(),
            eab_hmac_key: payload.eab_hmac_key.clone(),
        };
        self.issuer.register_account(&request).await?;
        Ok(())
    }

    async fn acquire(&self, payload: AcquirePayload) -> InvocationResponse {
        let primary = payload.domains.first().cloned().unwrap_or_default();
        let certificate_id = utils::certificate_id_for(&primary);

        let result = match self
            .with_account_state(|| self.acquire_certificate(&certificate_id, &payload))
            .await
            .into_result()
        {
            Ok(result) => result,
            Err(e) => {
                error!("Certificate acquisition for {:?} failed: {}", payload.domains, e);
                let mut result =
                    RenewalResult::failure(&certificate_id, &payload.domains, e.to_string());
                if let RenewalError::DocumentNotUpdated { handle, .. } = &e {
                    result.store_handle = Some(handle.clone());
                }
                result
            }
        };

        publish_quietly(self.notifier.as_ref(), acquire_message(&result)).await;

        match &result.error {
            None => InvocationResponse::ok(
                format!("Certificate {} issued for {}", certificate_id, primary),
                vec![result],
            ),
            Some(error) => InvocationResponse::failed(
                format!("Certificate acquisition failed: {}", error),
                vec![result],
            ),
        }
    }

    async fn acquire_certificate(
        &self,
        certificate_id: &str,
        payload: &AcquirePayload,
    ) -> Result<RenewalResult, RenewalError> {
        if payload.domains.is_empty() {
            return Err(RenewalError::InvalidRequest(
                "domains must not be empty".to_string(),
            ));
        }
        let mut spec = EntrySpec {
            id: certificate_id.to_string(),
            domains: payload.domains.clone(),
            email: Some(payload.email.clone()),
            acme_provider: Some(AcmeProvider::Custom),
            acme_server_url: Some(payload.server.clone()),
            dns_zone_id: payload.dns_zone_id.clone(),
            certificate_arn: None,
            renewal_threshold_days: Some(DEFAULT_RENEWAL_THRESHOLD_DAYS),
            enabled: Some(true),
            key_type: payload.key_algorithm,
            rsa_key_size: payload.rsa_key_size,
            extra: Default::default(),
        };
        // Validated against built-in defaults only; the payload is explicit
        let entry = ConfigurationDocument::default().resolve(&spec)?;

        let mut tracker = RenewalTracker::new(certificate_id);
        let issued = self
            .issue_and_import(
                &entry,
                payload.existing_handle.as_deref(),
                payload.force_renewal,
                &mut tracker,
            )
            .await?;
        tracker.advance(RenewalState::DoneSuccess);

        let mut document = self.load_document().await?;
        if let Some(existing) = document.find(certificate_id) {
            spec.renewal_threshold_days = existing
                .renewal_threshold_days
                .or(spec.renewal_threshold_days);
        }
        spec.certificate_arn = Some(issued.handle.clone());
        if document.upsert(spec) {
            info!("Added {} to the configuration document", certificate_id);
        } else {
            info!("Replaced {} in the configuration document", certificate_id);
        }
        self.save_document(&document)
            .await
            .map_err(|e| RenewalError::DocumentNotUpdated {
                handle: issued.handle.clone(),
                source: Box::new(e),
            })?;

        Ok(RenewalResult::success(
            certificate_id,
            &entry.domains,
            issued.handle,
            issued.expiry,
        ))
    }

    /// Per-entry results survive a failed write-back or push; the run-level
    /// failure is appended to them.
    async fn renew(&self, payload: RenewPayload) -> InvocationResponse {
        let synced = self.with_account_state(|| self.renew_all(&payload)).await;

        let (mut results, mut failures): (Vec<RenewalResult>, Vec<RenewalError>) = match synced.work {
            Ok(pass) => (pass.results, pass.write_back.err().into_iter().collect()),
            Err(e) => (Vec::new(), vec![e]),
        };
        if failures.is_empty() {
            failures.extend(synced.push_error);
        }

        for failure in &failures {
            error!("Renewal run failed: {}", failure);
            results.push(RenewalResult::failure(
                RENEWAL_RUN_RESULT_ID,
                &[],
                failure.to_string(),
            ));
        }

        publish_quietly(
            self.notifier.as_ref(),
            renew_message(&results, payload.dry_run),
        )
        .await;

        match failures.first() {
            None if payload.dry_run => InvocationResponse::ok("Dry run completed", results),
            None => InvocationResponse::ok("Renewal run completed", results),
            Some(e) => InvocationResponse::failed(format!("Renewal run failed: {}", e), results),
        }
    }

    async fn renew_all(&self, payload: &RenewPayload) -> Result<RenewPass, RenewalError> {
        let mut document = self.load_document().await?;
        let mut results = Vec::new();
        info!(
            "Renewal pass over {} entries (dry_run={})",
            document.entries.len(),
            payload.dry_run
        );

        for spec in &document.entries {
            let enabled = spec
                .enabled
                .or(document.defaults.enabled)
                .unwrap_or(true);
            if !enabled {
                info!("Skipping {}: disabled", spec.id);
                results.push(RenewalResult::skipped(
                    &spec.id,
                    &spec.domains,
                    "disabled",
                    spec.certificate_arn.clone(),
                ));
                continue;
            }
            if !payload.includes(&spec.id) {
                continue;
            }

            let result = match document.resolve(spec) {
                Ok(entry) => self.renew_entry(&entry, payload.dry_run).await,
                Err(e) => {
                    warn!("Entry {} is invalid: {}", spec.id, e);
                    RenewalResult::failure(&spec.id, &spec.domains, e.to_string())
                }
            };
            results.push(result);
        }

        let mut changed = false;
        for result in &results {
            if let Some(handle) = &result.store_handle {
                changed |= document.set_store_handle(&result.certificate_id, handle);
            }
        }
        let write_back = if changed {
            self.save_document(&document).await
        } else {
            Ok(())
        };

        Ok(RenewPass {
            results,
            write_back,
        })
    }

    /// The per-certificate procedure. Every error ends as a failure result.
    async fn renew_entry(&self, entry: &CertificateEntry, dry_run: bool) -> RenewalResult {
        let mut tracker = RenewalTracker::new(&entry.id);
        let prior = entry.store_handle.clone();

        if let Some(handle) = &prior {
            tracker.advance(RenewalState::CheckingExpiry);
            match self
                .certificates
                .needs_renewal(handle, entry.renewal_threshold_days)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracker.advance(RenewalState::DoneSkipped);
                    info!("{} is not yet due for renewal", entry.id);
                    return RenewalResult::skipped(
                        &entry.id,
                        &entry.domains,
                        "not yet due",
                        prior,
                    );
                }
                Err(e) => {
                    tracker.advance(RenewalState::DoneFailure);
                    error!("Expiry check for {} failed: {}", entry.id, e);
                    return RenewalResult::failure(&entry.id, &entry.domains, e.to_string());
                }
            }
        }

        if dry_run {
            tracker.advance(RenewalState::DryRunSkip);
            tracker.advance(RenewalState::DoneSkipped);
            info!("{} would be renewed (dry run)", entry.id);
            return RenewalResult::skipped(&entry.id, &entry.domains, "dry run", prior);
        }

        match self
            .issue_and_import(entry, prior.as_deref(), prior.is_some(), &mut tracker)
            .await
        {
            Ok(issued) => {
                tracker.advance(RenewalState::DoneSuccess);
                RenewalResult::success(&entry.id, &entry.domains, issued.handle, issued.expiry)
            }
            Err(e) => {
                tracker.advance(RenewalState::DoneFailure);
                error!("Renewal of {} failed: {}", entry.id, e);
                RenewalResult::failure(&entry.id, &entry.domains, e.to_string())
            }
        }
    }

    /// obtain, back up, import, describe
    async fn issue_and_import(
        &self,
        entry: &CertificateEntry,
        existing_handle: Option<&str>,
        force_renewal: bool,
        tracker: &mut RenewalTracker,
    ) -> Result<Issued, RenewalError> {
        tracker.advance(RenewalState::Issuing);
        let request = ObtainRequest::for_entry(entry, force_renewal);
        let paths = self.issuer.obtain(&request).await?;

        tracker.advance(RenewalState::Importing);
        backup_artifacts(
            &self.sync,
            &self.config.backup_prefix,
            &entry.id,
            &paths,
            Utc::now(),
        )
        .await?;

        let handle = self
            .certificates
            .import(&paths, &entry.id, existing_handle)
            .await?;
        let expiry = self
            .certificates
            .describe(&handle)
            .await?
            .and_then(|details| details.not_after);

        Ok(Issued { handle, expiry })
    }

    /// Read the configuration document; a missing document is an empty one
    pub async fn load_document(&self) -> Result<ConfigurationDocument, RenewalError> {
        match self.sync.fetch_text(&self.config.config_key).await? {
            Some(text) => Ok(ConfigurationDocument::parse(&text)?),
            None => {
                info!(
                    "No configuration document at {}, starting empty",
                    self.config.config_key
                );
                Ok(ConfigurationDocument::default())
            }
        }
    }

    async fn save_document(&self, document: &ConfigurationDocument) -> Result<(), RenewalError> {
        let text = document.to_json_pretty()?;
        self.sync.put_text(&self.config.config_key, &text).await?;
        info!(
            "Wrote configuration document ({} entries) to {}",
            document.entries.len(),
            self.config.config_key
        );
        Ok(())
    }

    /// initialize, pull, work, push, then cleanup whatever happened
    async fn with_account_state<T, F, Fut>(&self, work: F) -> Synced<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RenewalError>>,
    {
        let outcome = self.synced(work).await;
        self.issuer.cleanup().await;
        outcome
    }

    async fn synced<T, F, Fut>(&self, work: F) -> Synced<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RenewalError>>,
    {
        // Nothing was pulled, so nothing is pushed
        let local_dir = match self.restore_account_state().await {
            Ok(dir) => dir,
            Err(e) => {
                return Synced {
                    work: Err(e),
                    push_error: None,
                }
            }
        };

        let work = work().await;

        let push_error = match self.sync.push(&local_dir, &self.config.account_prefix).await {
            Ok(pushed) => {
                info!(
                    "Persisted account state: {} files, {} links",
                    pushed.files, pushed.links
                );
                None
            }
            Err(e) => {
                error!("Failed to persist account state: {}", e);
                Some(e.into())
            }
        };

        Synced { work, push_error }
    }

    async fn restore_account_state(&self) -> Result<PathBuf, RenewalError> {
        self.issuer.initialize().await?;
        let local_dir = self.issuer.account_state_dir();
        let pulled = self
            .sync
            .pull(&self.config.account_prefix, &local_dir)
            .await?;
        info!(
            "Restored account state: {} files, {} links",
            pulled.files, pulled.links
        );
        Ok(local_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use certsync_certstore::test_utils::InMemoryCertificateStore;
    use certsync_issuer::{CertificatePaths, IssuerError};
    use certsync_notifications::test_utils::RecordingNotifier;
    use certsync_storage::test_utils::InMemoryObjectStore;
    use mockall::{mock, Sequence};
    use std::path::{Path, PathBuf};

    mock! {
        Issuer {}

        #[async_trait]
        impl CertificateIssuer for Issuer {
            fn account_state_dir(&self) -> PathBuf;
            async fn initialize(&self) -> Result<(), IssuerError>;
            async fn register_account(&self, request: &RegisterRequest) -> Result<(), IssuerError>;
            async fn obtain(&self, request: &ObtainRequest) -> Result<CertificatePaths, IssuerError>;
            async fn cleanup(&self);
        }
    }

    fn orchestrator(
        issuer: MockIssuer,
        objects: Arc<InMemoryObjectStore>,
        notifier: Arc<RecordingNotifier>,
    ) -> RenewalOrchestrator {
        RenewalOrchestrator::new(
            RuntimeConfig::new("bucket", "arn:aws:sns:us-east-1:000000000000:certs"),
            Arc::new(issuer),
            objects,
            Arc::new(InMemoryCertificateStore::new()),
            notifier,
        )
    }

    fn register_payload() -> RegisterPayload {
        RegisterPayload {
            email: "ops@example.com".to_string(),
            server: "https://acme.zerossl.com/v2/DV90".to_string(),
            eab_kid: Some("kid".to_string()),
            eab_hmac_key: Some("hmac".to_string()),
        }
    }

    fn account_dir(root: &Path) -> PathBuf {
        root.join("config")
    }

    #[tokio::test]
    async fn test_register_runs_lifecycle_in_order() {
        let root = tempfile::tempdir().unwrap();
        let state_dir = account_dir(root.path());
        let mut seq = Sequence::new();
        let mut issuer = MockIssuer::new();

        issuer
            .expect_initialize()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        let dir = state_dir.clone();
        issuer
            .expect_account_state_dir()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || dir.clone());
        let dir = state_dir.clone();
        issuer
            .expect_register_account()
            .withf(|r| r.email == "ops@example.com" && r.eab_kid.as_deref() == Some("kid"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| {
                std::fs::create_dir_all(dir.join("accounts")).unwrap();
                std::fs::write(dir.join("accounts/regr.json"), "{}").unwrap();
                Ok(())
            });
        issuer
            .expect_cleanup()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| ());

        let objects = Arc::new(InMemoryObjectStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let response = orchestrator(issuer, objects.clone(), notifier.clone())
            .handle(InvocationRequest::Register(register_payload()))
            .await;

        assert_eq!(response.status_code, 200);
        assert!(response.body.results.is_empty());
        assert!(objects.contains("certbot/config/accounts/regr.json"));
        assert_eq!(notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_register_failure_still_pushes_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let state_dir = account_dir(root.path());
        std::fs::create_dir_all(&state_dir).unwrap();
        std::fs::write(state_dir.join("partial.json"), "{}").unwrap();

        let mut issuer = MockIssuer::new();
        issuer.expect_initialize().returning(|| Ok(()));
        issuer
            .expect_account_state_dir()
            .returning(move || state_dir.clone());
        issuer.expect_register_account().returning(|_| {
            Err(IssuerError::Issuance {
                operation: "register".to_string(),
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "The request message was malformed".to_string(),
            })
        });
        issuer.expect_cleanup().times(1).returning(|| ());

        let objects = Arc::new(InMemoryObjectStore::new());
        let notifier = Arc::new(RecordingNotifier::failing());
        let response = orchestrator(issuer, objects.clone(), notifier.clone())
            .handle(InvocationRequest::Register(register_payload()))
            .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body.results.len(), 1);
        assert_eq!(response.body.results[0].certificate_id, "account");
        assert!(response.body.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("malformed"));
        assert_eq!(response.body.summary.total_failed, 1);
        // pull succeeded, so push ran despite the failure
        assert!(objects.contains("certbot/config/partial.json"));
        // the failing notifier did not change the outcome
        assert_eq!(notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_initialize_failure_skips_work_but_cleans_up() {
        let mut issuer = MockIssuer::new();
        issuer.expect_initialize().returning(|| {
            Err(IssuerError::io(
                "/tmp/certsync/config",
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            ))
        });
        issuer.expect_account_state_dir().never();
        issuer.expect_register_account().never();
        issuer.expect_cleanup().times(1).returning(|| ());

        let response = orchestrator(
            issuer,
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(RecordingNotifier::new()),
        )
        .handle(InvocationRequest::Register(register_payload()))
        .await;

        assert_eq!(response.status_code, 500);
    }

    #[tokio::test]
    async fn test_invalid_register_email_never_reaches_issuer() {
        let root = tempfile::tempdir().unwrap();
        let state_dir = account_dir(root.path());
        let mut issuer = MockIssuer::new();
        issuer.expect_initialize().returning(|| Ok(()));
        issuer
            .expect_account_state_dir()
            .returning(move || state_dir.clone());
        issuer.expect_register_account().never();
        issuer.expect_cleanup().returning(|| ());

        let response = orchestrator(
            issuer,
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(RecordingNotifier::new()),
        )
        .handle(InvocationRequest::Register(RegisterPayload {
            email: "not-an-address".to_string(),
            ..register_payload()
        }))
        .await;

        assert_eq!(response.status_code, 500);
        assert!(response.body.message.contains("not a contact email"));
    }

    #[tokio::test]
    async fn test_malformed_document_fails_renewal_run() {
        let root = tempfile::tempdir().unwrap();
        let state_dir = account_dir(root.path());
        let mut issuer = MockIssuer::new();
        issuer.expect_initialize().returning(|| Ok(()));
        issuer
            .expect_account_state_dir()
            .returning(move || state_dir.clone());
        issuer.expect_obtain().never();
        issuer.expect_cleanup().times(1).returning(|| ());

        let objects = Arc::new(InMemoryObjectStore::new());
        objects.insert("config/domains.json", b"{ not json");

        let response = orchestrator(issuer, objects, Arc::new(RecordingNotifier::new()))
            .handle(InvocationRequest::Renew(RenewPayload::default()))
            .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body.results.len(), 1);
        assert_eq!(response.body.results[0].certificate_id, "renewal-run");
    }
}
