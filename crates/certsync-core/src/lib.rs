//! Core types shared by every certsync crate
//!
//! Holds the runtime configuration assembled at process entry, the configuration
//! document model, per-certificate results and the notification seam.

pub mod config;
pub mod entry;
pub mod error;
pub mod notifications;
pub mod results;
pub mod utils;

pub use config::{RuntimeConfig, RuntimeConfigInput};
pub use entry::{
    AcmeProvider, CertificateEntry, ConfigurationDocument, EntryDefaults, EntrySpec,
    KeyAlgorithm,
};
pub use error::CoreError;
pub use notifications::{
    publish_quietly, NotificationError, NotificationMessage, NotificationSeverity, Notifier,
};
pub use results::{RenewalOutcome, RenewalResult, RunSummary};

/// Convenient alias used across the workspace
pub type UtcDateTime = chrono::DateTime<chrono::Utc>;
