use serde::{Deserialize, Serialize};

use crate::UtcDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenewalOutcome {
    Success,
    Failure,
    Skipped,
}

/// Outcome of processing one certificate entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalResult {
    pub certificate_id: String,
    pub domains: Vec<String>,
    pub outcome: RenewalOutcome,
    /// `true` unless the outcome is a failure
    pub success: bool,
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<UtcDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl RenewalResult {
    fn base(certificate_id: &str, domains: &[String], outcome: RenewalOutcome) -> Self {
        Self {
            certificate_id: certificate_id.to_string(),
            domains: domains.to_vec(),
            outcome,
            success: outcome != RenewalOutcome::Failure,
            skipped: outcome == RenewalOutcome::Skipped,
            store_handle: None,
            expiry: None,
            error: None,
            skip_reason: None,
        }
    }

    pub fn success(
        certificate_id: &str,
        domains: &[String],
        store_handle: String,
        expiry: Option<UtcDateTime>,
    ) -> Self {
        Self {
            store_handle: Some(store_handle),
            expiry,
            ..Self::base(certificate_id, domains, RenewalOutcome::Success)
        }
    }

    pub fn failure(certificate_id: &str, domains: &[String], error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::base(certificate_id, domains, RenewalOutcome::Failure)
        }
    }

    pub fn skipped(
        certificate_id: &str,
        domains: &[String],
        reason: impl Into<String>,
        store_handle: Option<String>,
    ) -> Self {
        Self {
            skip_reason: Some(reason.into()),
            store_handle,
            ..Self::base(certificate_id, domains, RenewalOutcome::Skipped)
        }
    }
}

/// Aggregate counts over a set of results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_processed: usize,
    pub total_success: usize,
    pub total_failed: usize,
    pub total_skipped: usize,
}

impl RunSummary {
    pub fn from_results(results: &[RenewalResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            acc.total_processed += 1;
            match r.outcome {
                RenewalOutcome::Success => acc.total_success += 1,
                RenewalOutcome::Failure => acc.total_failed += 1,
                RenewalOutcome::Skipped => acc.total_skipped += 1,
            }
            acc
        })
    }
}
