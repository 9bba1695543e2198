use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::UtcDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub id: String,
    pub subject: String,
    pub body: String,
    pub severity: NotificationSeverity,
    pub timestamp: UtcDateTime,
    pub metadata: HashMap<String, String>,
}

impl NotificationMessage {
    pub fn new(
        subject: impl Into<String>,
        body: impl Into<String>,
        severity: NotificationSeverity,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subject: subject.into(),
            body: body.into(),
            severity,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Sink for run summaries. Callers treat errors as log-only.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, message: NotificationMessage) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification not configured: {0}")]
    NotConfigured(String),
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
}

/// Publish and swallow failures so the caller's outcome is never altered
pub async fn publish_quietly(notifier: &dyn Notifier, message: NotificationMessage) {
    let subject = message.subject.clone();
    if let Err(e) = notifier.publish(message).await {
        tracing::warn!("Failed to publish notification '{}': {}", subject, e);
    }
}
