pub mod adapters;
pub mod error;
pub mod types;

pub use adapters::{LogNotifier, Notifier, RecordingNotifier, SmtpNotifier};
pub use error::NotificationError;
pub use types::{Notification, Severity};

use permsync_config::NotificationsConfig;
use std::sync::Arc;

pub type DynNotifier = Arc<dyn Notifier>;

/// Picks the notifier for a configuration: SMTP when enabled, the log otherwise.
pub fn build_notifier(config: &NotificationsConfig) -> Result<DynNotifier, NotificationError> {
    if config.enabled {
        let smtp = SmtpNotifier::from_config(config)?;
        tracing::info!(recipients = config.to.len(), "email notifications enabled");
        Ok(Arc::new(smtp))
    } else {
        Ok(Arc::new(LogNotifier))
    }
}
