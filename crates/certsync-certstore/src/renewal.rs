//! Renewal decision

use certsync_core::UtcDateTime;

use crate::store::CertificateDetails;

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days until `not_after`, rounded down (negative once expired)
pub fn days_until_expiry(not_after: UtcDateTime, now: UtcDateTime) -> i64 {
    (not_after - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Missing details or a missing expiry always count as due
pub fn renewal_due(details: Option<&CertificateDetails>, threshold_days: u32, now: UtcDateTime) -> bool {
    match details.and_then(|d| d.not_after) {
        Some(not_after) => days_until_expiry(not_after, now) <= i64::from(threshold_days),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn now() -> UtcDateTime {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn details(not_after: Option<UtcDateTime>) -> CertificateDetails {
        CertificateDetails {
            domain_name: "example.com".to_string(),
            not_after,
            status: Some("ISSUED".to_string()),
        }
    }

    #[test]
    fn test_missing_details_always_due() {
        for threshold in [0, 1, 30, 365, u32::MAX] {
            assert!(renewal_due(None, threshold, now()));
            assert!(renewal_due(Some(&details(None)), threshold, now()));
        }
    }

    #[test]
    fn test_far_expiry_not_due() {
        let d = details(Some(now() + Duration::days(100)));
        assert!(!renewal_due(Some(&d), 30, now()));
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let d = details(Some(now() + Duration::days(30) + Duration::hours(23)));
        assert_eq!(days_until_expiry(d.not_after.unwrap(), now()), 30);
        assert!(renewal_due(Some(&d), 30, now()));
        assert!(!renewal_due(Some(&d), 29, now()));
    }

    #[test]
    fn test_expired_certificate_due_even_with_zero_threshold() {
        let d = details(Some(now() - Duration::hours(1)));
        assert_eq!(days_until_expiry(d.not_after.unwrap(), now()), -1);
        assert!(renewal_due(Some(&d), 0, now()));
    }

    #[test]
    fn test_zero_threshold_on_last_day() {
        let d = details(Some(now() + Duration::hours(5)));
        assert!(renewal_due(Some(&d), 0, now()));
        let d = details(Some(now() + Duration::days(2)));
        assert!(!renewal_due(Some(&d), 0, now()));
    }
}
