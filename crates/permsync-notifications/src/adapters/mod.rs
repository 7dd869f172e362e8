pub mod email;
pub mod log;
pub mod recording;

use async_trait::async_trait;

use crate::error::NotificationError;
use crate::types::Notification;

/// Delivers run reports.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

pub use email::SmtpNotifier;
pub use log::LogNotifier;
pub use recording::RecordingNotifier;
