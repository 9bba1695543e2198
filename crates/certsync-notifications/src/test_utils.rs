//! Recording notifier for tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use certsync_core::{NotificationError, NotificationMessage, Notifier};

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<NotificationMessage>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record messages but report every publish as failed
    pub fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<NotificationMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.subject).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, message: NotificationMessage) -> Result<(), NotificationError> {
        self.messages.lock().unwrap().push(message);
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError::SendFailed("topic unavailable".to_string()));
        }
        Ok(())
    }
}
