//! Managed certificate store integration
//!
//! [`CertificateManager`] imports PEM artifacts idempotently (new entry vs. re-import),
//! reads back expiry metadata and decides whether a certificate is due for renewal.
//! The store itself sits behind [`ManagedCertificateStore`]; ACM is the production backend.

mod acm;
mod errors;
mod manager;
pub mod renewal;
mod store;

pub use acm::AcmCertificateStore;
pub use errors::CertStoreError;
pub use manager::{CertificateManager, MANAGED_BY_TAG_VALUE};
pub use renewal::{days_until_expiry, renewal_due};
pub use store::{CertificateDetails, ImportRequest, ManagedCertificateStore};

// Exported so other crates can drive the manager in their tests
pub mod test_utils;
