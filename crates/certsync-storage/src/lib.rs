//! Durable state for stateless invocations
//!
//! [`StateSync`] mirrors the issuance tool's local working tree to an object store prefix
//! and back, and offers the single-object primitives used for the configuration document
//! and certificate backups.

mod errors;
mod object_store;
mod s3;
mod sync;

pub use errors::StorageError;
pub use object_store::ObjectStore;
pub use s3::S3ObjectStore;
pub use sync::{StateSync, SyncReport, SYMLINK_MANIFEST};

// Exported so other crates can drive the sync layer in their tests
pub mod test_utils;
