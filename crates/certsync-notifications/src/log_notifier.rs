use async_trait::async_trait;
use certsync_core::{NotificationError, NotificationMessage, NotificationSeverity, Notifier};
use tracing::{error, info, warn};

/// Writes messages to the log instead of a topic
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, message: NotificationMessage) -> Result<(), NotificationError> {
        match message.severity {
            NotificationSeverity::Info => info!("{}\n{}", message.subject, message.body),
            NotificationSeverity::Warning => warn!("{}\n{}", message.subject, message.body),
            NotificationSeverity::Error => error!("{}\n{}", message.subject, message.body),
        }
        Ok(())
    }
}
