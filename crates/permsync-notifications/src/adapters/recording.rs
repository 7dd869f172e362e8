use async_trait::async_trait;
use tokio::sync::Mutex;

use super::Notifier;
use crate::error::NotificationError;
use crate::types::Notification;

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_in_order() {
        let notifier = RecordingNotifier::new();
        notifier
            .notify(&Notification::summary("Full sync", "Added 1"))
            .await
            .unwrap();
        notifier
            .notify(&Notification::fatal("Full sync", "boom", false))
            .await
            .unwrap();
        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].body, "Added 1");
    }
}
