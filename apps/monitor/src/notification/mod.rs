pub mod dispatcher;
pub mod transport;

pub use dispatcher::NotificationDispatcher;
pub use transport::HttpTransport;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::models::Settings;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("{0} delivery is not configured")]
    NotConfigured(&'static str),
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{channel} rejected the notification: {reason}")]
    Rejected { channel: &'static str, reason: String },
}

/// Where an alert goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Email { address: String },
    Slack { webhook: String },
    Telegram { chat_id: String },
}

impl Destination {
    pub fn channel(&self) -> &'static str {
        match self {
            Destination::Email { .. } => "email",
            Destination::Slack { .. } => "slack",
            Destination::Telegram { .. } => "telegram",
        }
    }

    /// Every destination enabled by `settings`, empty when alerts are off
    pub fn from_settings(settings: &Settings) -> Vec<Destination> {
        let mut destinations = Vec::new();

        let alert_email = settings.alert_email.trim();
        if settings.email_notifications && !alert_email.is_empty() {
            destinations.push(Destination::Email { address: alert_email.to_string() });
        }

        let slack_webhook = settings.slack_webhook.trim();
        if !slack_webhook.is_empty() {
            destinations.push(Destination::Slack { webhook: slack_webhook.to_string() });
        }

        let chat_id = settings.telegram_chat_id.trim();
        if settings.telegram_notifications && !chat_id.is_empty() {
            destinations.push(Destination::Telegram { chat_id: chat_id.to_string() });
        }

        destinations
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Email { address } => write!(f, "email:{address}"),
            // Webhook URLs embed a secret, only show the channel
            Destination::Slack { .. } => write!(f, "slack"),
            Destination::Telegram { chat_id } => write!(f, "telegram:{chat_id}"),
        }
    }
}

/// Delivers one message to one destination
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(
        &self,
        destination: &Destination,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_have_no_destination() {
        assert!(Destination::from_settings(&Settings::default()).is_empty());
    }

    #[test]
    fn test_destinations_follow_toggles() {
        let settings = Settings {
            email_notifications: true,
            alert_email: " ops@example.com ".to_string(),
            telegram_notifications: false,
            telegram_chat_id: "12345".to_string(),
            slack_webhook: "https://hooks.slack.com/services/T/B/X".to_string(),
            ..Settings::default()
        };

        let destinations = Destination::from_settings(&settings);
        assert_eq!(
            destinations,
            vec![
                Destination::Email { address: "ops@example.com".to_string() },
                Destination::Slack {
                    webhook: "https://hooks.slack.com/services/T/B/X".to_string()
                },
            ]
        );

        let settings = Settings { email_notifications: false, telegram_notifications: true, ..settings };
        let channels: Vec<_> =
            Destination::from_settings(&settings).iter().map(Destination::channel).collect();
        assert_eq!(channels, vec!["slack", "telegram"]);
    }
}
