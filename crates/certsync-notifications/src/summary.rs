//! Subjects and bodies for the per-invocation message

use std::fmt::Write as _;

use certsync_core::{
    NotificationMessage, NotificationSeverity, RenewalOutcome, RenewalResult, RunSummary,
};
use chrono::SecondsFormat;

const PREFIX: &str = "[certsync]";

fn describe_result(result: &RenewalResult) -> String {
    let mut line = format!(
        "- {} ({}): {}",
        result.certificate_id,
        result.domains.join(", "),
        match result.outcome {
            RenewalOutcome::Success => "renewed",
            RenewalOutcome::Failure => "FAILED",
            RenewalOutcome::Skipped => "skipped",
        }
    );
    if let Some(reason) = &result.skip_reason {
        let _ = write!(line, " ({})", reason);
    }
    if let Some(handle) = &result.store_handle {
        let _ = write!(line, "\n    certificate: {}", handle);
    }
    if let Some(expiry) = result.expiry {
        let _ = write!(
            line,
            "\n    expires: {}",
            expiry.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }
    if let Some(error) = &result.error {
        let _ = write!(line, "\n    error: {}", error);
    }
    line
}

pub fn register_message(email: &str, server_url: &str, error: Option<&str>) -> NotificationMessage {
    let (subject, severity) = match error {
        None => (
            format!("{} ACME account registered", PREFIX),
            NotificationSeverity::Info,
        ),
        Some(_) => (
            format!("{} ACME account registration failed", PREFIX),
            NotificationSeverity::Error,
        ),
    };

    let mut body = format!("Account: {}\nServer: {}\n", email, server_url);
    if let Some(error) = error {
        let _ = writeln!(body, "\nError: {}", error);
    }

    NotificationMessage::new(subject, body, severity)
        .with_metadata("mode", "register")
        .with_metadata("email", email)
}

pub fn acquire_message(result: &RenewalResult) -> NotificationMessage {
    let primary = result
        .domains
        .first()
        .map(String::as_str)
        .unwrap_or(result.certificate_id.as_str());
    let (subject, severity) = match result.outcome {
        RenewalOutcome::Failure => (
            format!("{} Certificate request failed for {}", PREFIX, primary),
            NotificationSeverity::Error,
        ),
        _ => (
            format!("{} Certificate issued for {}", PREFIX, primary),
            NotificationSeverity::Info,
        ),
    };

    NotificationMessage::new(subject, format!("{}\n", describe_result(result)), severity)
        .with_metadata("mode", "acquire-on-demand")
        .with_metadata("certificateId", result.certificate_id.clone())
}

pub fn renew_message(results: &[RenewalResult], dry_run: bool) -> NotificationMessage {
    let summary = RunSummary::from_results(results);
    let severity = if summary.total_failed > 0 {
        NotificationSeverity::Error
    } else {
        NotificationSeverity::Info
    };

    let subject = format!(
        "{}{} Renewal run: {} renewed, {} failed, {} skipped",
        PREFIX,
        if dry_run { " [dry run]" } else { "" },
        summary.total_success,
        summary.total_failed,
        summary.total_skipped
    );

    let mut body = format!(
        "Processed {} certificate(s): {} renewed, {} failed, {} skipped.\n",
        summary.total_processed, summary.total_success, summary.total_failed, summary.total_skipped
    );
    for outcome in [
        RenewalOutcome::Failure,
        RenewalOutcome::Success,
        RenewalOutcome::Skipped,
    ] {
        for result in results.iter().filter(|r| r.outcome == outcome) {
            let _ = writeln!(body, "{}", describe_result(result));
        }
    }

    NotificationMessage::new(subject, body, severity)
        .with_metadata("mode", "renew")
        .with_metadata("dryRun", dry_run.to_string())
}
