use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertStoreError {
    /// The store accepted the call but returned no usable handle
    #[error("Import error: {0}")]
    Import(String),

    #[error("Certificate not found: {0}")]
    NotFound(String),

    #[error("Certificate store API error: {0}")]
    Api(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CertStoreError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        CertStoreError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
