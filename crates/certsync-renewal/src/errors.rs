use certsync_certstore::CertStoreError;
use certsync_core::CoreError;
use certsync_issuer::IssuerError;
use certsync_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenewalError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Issuer(#[from] IssuerError),

    #[error(transparent)]
    CertStore(#[from] CertStoreError),

    /// The invocation payload is structurally valid but unusable
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Imported into the store, but the handle never reached the configuration document
    #[error("Certificate imported as {handle} but the configuration document was not updated: {source}")]
    DocumentNotUpdated {
        handle: String,
        #[source]
        source: Box<RenewalError>,
    },
}
