//! Naming helpers shared by the issuer and the orchestrator

use chrono::SecondsFormat;

use crate::UtcDateTime;

/// Lineage name pinned for the issuance tool
///
/// The primary domain itself, with a wildcard label spelled `wildcard` so that `*.example.com`
/// and `example.com` never share a lineage.
pub fn lineage_name(primary_domain: &str) -> String {
    let domain = primary_domain.trim().to_lowercase();
    match domain.strip_prefix("*.") {
        Some(rest) => format!("wildcard.{}", rest),
        None => domain,
    }
}

/// Stable configuration id derived from a primary domain
///
/// `*.example.com` becomes `wildcard-example-com`, `api.example.com` becomes `api-example-com`.
pub fn certificate_id_for(primary_domain: &str) -> String {
    lineage_name(primary_domain).replace('.', "-")
}

/// Millisecond UTC timestamp with `:` and `.` replaced so it is safe as a key segment
pub fn backup_timestamp(now: UtcDateTime) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}
