use async_trait::async_trait;

use super::Notifier;
use crate::error::NotificationError;
use crate::types::{Notification, Severity};

/// Writes notifications to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        match notification.severity {
            Severity::Info => {
                tracing::info!(subject = %notification.subject, "{}", notification.body)
            }
            Severity::Warning => {
                tracing::warn!(subject = %notification.subject, "{}", notification.body)
            }
            Severity::Error => {
                tracing::error!(subject = %notification.subject, "{}", notification.body)
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
