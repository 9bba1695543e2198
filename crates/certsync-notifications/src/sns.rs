//! SNS topic publisher

use async_trait::async_trait;
use aws_sdk_sns::error::ProvideErrorMetadata;
use aws_sdk_sns::Client as SnsClient;
use certsync_core::{NotificationError, NotificationMessage, Notifier};
use tracing::debug;

/// SNS rejects longer subjects
pub const MAX_SUBJECT_LEN: usize = 100;

pub struct SnsNotifier {
    client: SnsClient,
    topic_arn: String,
}

impl SnsNotifier {
    pub fn new(client: SnsClient, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }

    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }
}

/// Single line, printable, at most [`MAX_SUBJECT_LEN`] characters
pub fn sanitize_subject(subject: &str) -> String {
    subject
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(MAX_SUBJECT_LEN)
        .collect::<String>()
        .trim()
        .to_string()
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn publish(&self, message: NotificationMessage) -> Result<(), NotificationError> {
        if self.topic_arn.is_empty() {
            return Err(NotificationError::NotConfigured(
                "no topic ARN configured".to_string(),
            ));
        }

        let response = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(sanitize_subject(&message.subject))
            .message(&message.body)
            .send()
            .await
            .map_err(|e| {
                NotificationError::SendFailed(
                    e.message().map(str::to_string).unwrap_or_else(|| e.to_string()),
                )
            })?;

        debug!(
            "Published notification {} to {} (message id {:?})",
            message.id,
            self.topic_arn,
            response.message_id()
        );
        Ok(())
    }
}
