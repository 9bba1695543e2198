mod common;

use certsync_core::RenewalOutcome;
use certsync_renewal::{InvocationRequest, RenewPayload};
use chrono::{Duration, Utc};
use common::{Harness, ScriptedCertbot};
use serde_json::json;

fn renew(dry_run: bool, ids: Option<&[&str]>) -> InvocationRequest {
    InvocationRequest::Renew(RenewPayload {
        certificate_ids: ids.map(|ids| ids.iter().map(|i| i.to_string()).collect()),
        dry_run,
    })
}

fn entry(id: &str, domain: &str) -> serde_json::Value {
    json!({ "id": id, "domains": [domain], "email": "ops@example.com" })
}

#[tokio::test]
async fn test_new_entry_is_issued_and_imported() {
    let harness = Harness::new();
    harness.put_document(json!({ "version": "1.0", "entries": [entry("example-com", "example.com")] }));

    let response = harness.orchestrator.handle(renew(false, None)).await;

    assert_eq!(response.status_code, 200);
    assert_eq!(harness.certbot.certonly_calls().len(), 1);
    assert_eq!(harness.certificates.import_calls(), vec![None]);

    let result = &response.body.results[0];
    assert_eq!(result.outcome, RenewalOutcome::Success);
    assert!(result.success && !result.skipped);
    let handle = result.store_handle.clone().unwrap();
    assert!(handle.starts_with("arn:aws:acm:"));
    assert!(result.expiry.is_some());

    let args = &harness.certbot.certonly_calls()[0].args;
    assert!(!args.contains(&"--force-renewal".to_string()));

    // the new handle is written back
    let document = harness.document().unwrap();
    assert_eq!(document["entries"][0]["certificateArn"], json!(handle));
    // and the artifacts are backed up and part of the pushed account state
    assert_eq!(
        harness
            .objects
            .keys_with_prefix("certificates/example-com/")
            .len(),
        4
    );
    assert!(harness
        .objects
        .contains("certbot/config/live/example.com/privkey.pem"));

    let tags = harness.certificates.tags(&handle);
    assert_eq!(tags[0], ("managedBy".to_string(), "certsync".to_string()));
    assert_eq!(tags[1], ("certificateId".to_string(), "example-com".to_string()));
    assert_eq!(tags[2].0, "lastRenewal");
    assert!(!harness.work_root_exists());
    assert_eq!(harness.notifier.messages().len(), 1);
}

#[tokio::test]
async fn test_entry_far_from_expiry_is_skipped() {
    let harness = Harness::new();
    harness
        .certificates
        .insert("arn:existing", "example.com", Some(Utc::now() + Duration::days(100)));
    harness.put_document(json!({
        "entries": [{
            "id": "example-com",
            "domains": ["example.com"],
            "email": "ops@example.com",
            "certificateArn": "arn:existing",
            "renewalThresholdDays": 30
        }]
    }));
    let before = harness.objects.text("config/domains.json");

    let response = harness.orchestrator.handle(renew(false, None)).await;

    assert_eq!(response.status_code, 200);
    let result = &response.body.results[0];
    assert_eq!(result.outcome, RenewalOutcome::Skipped);
    assert_eq!(result.skip_reason.as_deref(), Some("not yet due"));
    assert_eq!(result.store_handle.as_deref(), Some("arn:existing"));
    assert!(harness.certbot.invocations().is_empty());
    assert!(harness.certificates.import_calls().is_empty());
    assert_eq!(harness.objects.text("config/domains.json"), before);
}

#[tokio::test]
async fn test_entry_inside_threshold_is_rotated() {
    let harness = Harness::new();
    harness
        .certificates
        .insert("arn:existing", "example.com", Some(Utc::now() + Duration::days(10)));
    harness.put_document(json!({
        "entries": [{
            "id": "example-com",
            "domains": ["example.com"],
            "email": "ops@example.com",
            "certificateArn": "arn:existing"
        }]
    }));

    let response = harness.orchestrator.handle(renew(false, None)).await;

    let result = &response.body.results[0];
    assert_eq!(result.outcome, RenewalOutcome::Success);
    assert_eq!(result.store_handle.as_deref(), Some("arn:existing"));
    assert_eq!(
        harness.certificates.import_calls(),
        vec![Some("arn:existing".to_string())]
    );
    assert!(harness.certbot.certonly_calls()[0]
        .args
        .contains(&"--force-renewal".to_string()));
    // re-import does not retag
    assert!(harness.certificates.tags("arn:existing").is_empty());
}

#[tokio::test]
async fn test_one_failure_does_not_stop_the_batch() {
    let harness = Harness::with_certbot(ScriptedCertbot::failing_for(&["broken.example.com"]));
    harness.put_document(json!({
        "entries": [
            entry("first", "first.example.com"),
            entry("broken", "broken.example.com"),
            entry("third", "third.example.com")
        ]
    }));

    let response = harness.orchestrator.handle(renew(false, None)).await;

    assert_eq!(response.status_code, 200);
    assert_eq!(harness.certbot.certonly_calls().len(), 3);
    let ids: Vec<&str> = response
        .body
        .results
        .iter()
        .map(|r| r.certificate_id.as_str())
        .collect();
    assert_eq!(ids, vec!["first", "broken", "third"]);

    assert_eq!(response.body.summary.total_processed, 3);
    assert_eq!(response.body.summary.total_success, 2);
    assert_eq!(response.body.summary.total_failed, 1);

    let failed = &response.body.results[1];
    assert!(!failed.success);
    assert!(failed.error.as_deref().unwrap().contains("NXDOMAIN"));

    // handles of the two successes were written back, the failure has none
    let document = harness.document().unwrap();
    assert!(document["entries"][0]["certificateArn"].is_string());
    assert!(document["entries"][1].get("certificateArn").is_none());
    assert!(document["entries"][2]["certificateArn"].is_string());
}

#[tokio::test]
async fn test_disabled_entries_are_reported_and_never_issued() {
    let harness = Harness::new();
    harness.put_document(json!({
        "entries": [{
            "id": "off",
            "domains": ["off.example.com"],
            "email": "ops@example.com",
            "enabled": false
        }]
    }));

    let response = harness.orchestrator.handle(renew(false, None)).await;

    assert_eq!(response.body.results.len(), 1);
    assert_eq!(response.body.results[0].skip_reason.as_deref(), Some("disabled"));
    assert!(harness.certbot.invocations().is_empty());
}

#[tokio::test]
async fn test_document_default_can_disable_entries() {
    let harness = Harness::new();
    harness.put_document(json!({
        "defaults": { "enabled": false, "email": "ops@example.com" },
        "entries": [
            { "id": "a", "domains": ["a.example.com"] },
            { "id": "b", "domains": ["b.example.com"], "enabled": true }
        ]
    }));

    let response = harness.orchestrator.handle(renew(false, None)).await;

    assert_eq!(response.body.results[0].skip_reason.as_deref(), Some("disabled"));
    assert_eq!(response.body.results[1].outcome, RenewalOutcome::Success);
    assert_eq!(harness.certbot.certonly_calls().len(), 1);
}

#[tokio::test]
async fn test_dry_run_never_obtains() {
    let harness = Harness::new();
    harness
        .certificates
        .insert("arn:expiring", "a.example.com", Some(Utc::now() + Duration::days(2)));
    harness.put_document(json!({
        "entries": [
            entry("new", "new.example.com"),
            {
                "id": "expiring",
                "domains": ["a.example.com"],
                "email": "ops@example.com",
                "certificateArn": "arn:expiring"
            }
        ]
    }));

    let response = harness.orchestrator.handle(renew(true, None)).await;

    assert_eq!(response.status_code, 200);
    assert!(harness.certbot.certonly_calls().is_empty());
    for result in &response.body.results {
        assert!(result.success);
        assert!(result.skipped);
        assert_eq!(result.skip_reason.as_deref(), Some("dry run"));
    }
    assert_eq!(
        response.body.results[1].store_handle.as_deref(),
        Some("arn:expiring")
    );
    assert!(harness.notifier.subjects()[0].contains("[dry run]"));
}

#[tokio::test]
async fn test_id_filter_skips_silently_after_enabled_check() {
    let harness = Harness::new();
    harness.put_document(json!({
        "entries": [
            entry("a", "a.example.com"),
            entry("b", "b.example.com"),
            { "id": "c", "domains": ["c.example.com"], "email": "ops@example.com", "enabled": false }
        ]
    }));

    let response = harness.orchestrator.handle(renew(false, Some(&["b"]))).await;

    let ids: Vec<&str> = response
        .body
        .results
        .iter()
        .map(|r| r.certificate_id.as_str())
        .collect();
    assert_eq!(ids, vec!["b", "c"]);
    assert_eq!(response.body.summary.total_processed, 2);
    assert_eq!(harness.certbot.certonly_calls().len(), 1);
}

#[tokio::test]
async fn test_invalid_entry_is_a_failure_result() {
    let harness = Harness::new();
    harness.put_document(json!({
        "entries": [
            { "id": "custom", "domains": ["x.example.com"], "email": "ops@example.com", "acmeProvider": "custom" },
            entry("ok", "ok.example.com")
        ]
    }));

    let response = harness.orchestrator.handle(renew(false, None)).await;

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body.results[0].outcome, RenewalOutcome::Failure);
    assert!(response.body.results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("acmeServerUrl"));
    assert_eq!(response.body.results[1].outcome, RenewalOutcome::Success);
}

#[tokio::test]
async fn test_missing_document_is_an_empty_run() {
    let harness = Harness::new();

    let response = harness.orchestrator.handle(renew(false, None)).await;

    assert_eq!(response.status_code, 200);
    assert!(response.body.results.is_empty());
    assert!(harness.document().is_none());
}

#[tokio::test]
async fn test_account_state_survives_the_round_trip() {
    let harness = Harness::new();
    harness.objects.insert(
        "certbot/config/accounts/acme-v02.api.letsencrypt.org/directory/abc/regr.json",
        br#"{"uri": "https://acme.example/acct/1"}"#,
    );
    harness.put_document(json!({ "entries": [entry("example-com", "example.com")] }));

    harness.orchestrator.handle(renew(false, None)).await;

    assert_eq!(
        harness
            .objects
            .text("certbot/config/accounts/acme-v02.api.letsencrypt.org/directory/abc/regr.json")
            .as_deref(),
        Some(r#"{"uri": "https://acme.example/acct/1"}"#)
    );
    assert!(harness.objects.contains("certbot/config/.symlinks.json"));
    assert!(!harness.work_root_exists());
}

#[tokio::test]
async fn test_failed_write_back_keeps_issued_handles_in_response() {
    let harness = Harness::new();
    harness.put_document(json!({ "entries": [entry("example-com", "example.com")] }));
    harness.objects.fail_puts("config/domains.json");

    let response = harness.orchestrator.handle(renew(false, None)).await;

    assert_eq!(response.status_code, 500);
    assert_eq!(response.body.results.len(), 2);

    let issued = &response.body.results[0];
    assert_eq!(issued.certificate_id, "example-com");
    assert_eq!(issued.outcome, RenewalOutcome::Success);
    let handle = issued.store_handle.clone().unwrap();
    assert_eq!(harness.certificates.handles(), vec![handle.clone()]);

    let run = &response.body.results[1];
    assert_eq!(run.certificate_id, "renewal-run");
    assert!(run.error.as_deref().unwrap().contains("AccessDenied"));
    assert_eq!(response.body.summary.total_success, 1);
    assert_eq!(response.body.summary.total_failed, 1);

    // the document is untouched, but the handle reaches the operator
    assert!(harness.document().unwrap()["entries"][0]
        .get("certificateArn")
        .is_none());
    let messages = harness.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].body.contains(&handle));

    // account state is still pushed and the work root removed
    assert!(harness
        .objects
        .contains("certbot/config/live/example.com/cert.pem"));
    assert!(!harness.work_root_exists());
}

#[tokio::test]
async fn test_push_failure_after_successful_pass_fails_the_run() {
    let harness = Harness::new();
    harness.put_document(json!({ "entries": [entry("example-com", "example.com")] }));
    harness.objects.fail_puts("certbot/config/");

    let response = harness.orchestrator.handle(renew(false, None)).await;

    assert_eq!(response.status_code, 500);
    assert!(response.body.message.contains("AccessDenied"));
    let ids: Vec<&str> = response
        .body
        .results
        .iter()
        .map(|r| r.certificate_id.as_str())
        .collect();
    assert_eq!(ids, vec!["example-com", "renewal-run"]);
    assert_eq!(response.body.results[0].outcome, RenewalOutcome::Success);

    // the handle was written back before the push
    let handle = response.body.results[0].store_handle.clone().unwrap();
    assert_eq!(
        harness.document().unwrap()["entries"][0]["certificateArn"],
        json!(handle)
    );
    assert!(!harness.work_root_exists());
}

#[tokio::test]
async fn test_wildcard_and_apex_entries_use_distinct_lineages() {
    let harness = Harness::new();
    harness.put_document(json!({
        "entries": [
            {
                "id": "wildcard-example-com",
                "domains": ["*.example.com"],
                "email": "ops@example.com"
            },
            entry("example-com", "example.com")
        ]
    }));

    let response = harness.orchestrator.handle(renew(false, None)).await;

    assert_eq!(response.status_code, 200);
    let lineages: Vec<String> = harness
        .certbot
        .certonly_calls()
        .iter()
        .map(|call| {
            let name = call.args.iter().position(|a| a == "--cert-name").unwrap();
            call.args[name + 1].clone()
        })
        .collect();
    assert_eq!(lineages, vec!["wildcard.example.com", "example.com"]);

    let handles: Vec<String> = response
        .body
        .results
        .iter()
        .map(|r| r.store_handle.clone().unwrap())
        .collect();
    assert_ne!(handles[0], handles[1]);
    assert!(harness
        .objects
        .contains("certbot/config/live/wildcard.example.com/privkey.pem"));
    assert!(harness
        .objects
        .contains("certbot/config/live/example.com/privkey.pem"));
}
