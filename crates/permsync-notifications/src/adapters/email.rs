use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor, message::header::ContentType,
    transport::smtp::authentication::Credentials,
};
use permsync_config::NotificationsConfig;

use super::Notifier;
use crate::error::NotificationError;
use crate::types::Notification;

/// Sends notifications over SMTP.
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    from: String,
    to: Vec<String>,
}

impl SmtpNotifier {
    pub fn from_config(config: &NotificationsConfig) -> Result<Self, NotificationError> {
        let host = config
            .smtp_host
            .clone()
            .filter(|h| !h.trim().is_empty())
            .ok_or(NotificationError::InvalidConfig("Missing smtp_host".into()))?;
        if config.to.is_empty() {
            return Err(NotificationError::RecipientNotFound);
        }
        Ok(Self {
            host,
            port: config.smtp_port,
            username: config.smtp_username.clone(),
            password: config.smtp_password.clone(),
            from: config.from.clone(),
            to: config.to.clone(),
        })
    }

    fn build_message(&self, notification: &Notification) -> Result<Message, NotificationError> {
        let mut builder = Message::builder()
            .from(self.from.parse().map_err(|e| {
                NotificationError::InvalidConfig(format!("Invalid from: {e}"))
            })?)
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for to in &self.to {
            builder = builder.to(to
                .parse()
                .map_err(|e| NotificationError::InvalidConfig(format!("Invalid to: {e}")))?);
        }
        builder
            .body(notification.body.clone())
            .map_err(|e| NotificationError::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        let email = self.build_message(notification)?;

        let mut mailer_builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
            .map_err(|e| NotificationError::InvalidConfig(e.to_string()))?
            .port(self.port);

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            mailer_builder =
                mailer_builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let mailer = mailer_builder.build();

        mailer
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| NotificationError::send_failed(e.to_string()))
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NotificationsConfig {
        NotificationsConfig {
            enabled: true,
            smtp_host: Some("smtp.example.com".into()),
            from: "permsync@example.com".into(),
            to: vec!["ops@example.com".into(), "admin@example.com".into()],
            ..NotificationsConfig::default()
        }
    }

    #[test]
    fn test_from_config_requires_host() {
        let mut cfg = config();
        cfg.smtp_host = None;
        assert!(matches!(
            SmtpNotifier::from_config(&cfg),
            Err(NotificationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_config_requires_recipients() {
        let mut cfg = config();
        cfg.to.clear();
        assert!(matches!(
            SmtpNotifier::from_config(&cfg),
            Err(NotificationError::RecipientNotFound)
        ));
    }

    #[test]
    fn test_build_message() {
        let notifier = SmtpNotifier::from_config(&config()).unwrap();
        let message = notifier
            .build_message(&Notification::summary("Full sync", "Added 2"))
            .unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("Subject: permsync: Full sync finished"));
        assert!(formatted.contains("ops@example.com"));
    }

    #[test]
    fn test_invalid_recipient() {
        let mut cfg = config();
        cfg.to = vec!["not an address".into()];
        let notifier = SmtpNotifier::from_config(&cfg).unwrap();
        assert!(
            notifier
                .build_message(&Notification::summary("Full sync", "x"))
                .is_err()
        );
    }
}
