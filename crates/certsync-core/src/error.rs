use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Required runtime configuration is missing; nothing has been touched yet
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Invalid certificate entry '{id}': {reason}")]
    InvalidEntry { id: String, reason: String },

    #[error("Invalid configuration document: {0}")]
    InvalidDocument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    pub fn invalid_entry(id: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidEntry {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
