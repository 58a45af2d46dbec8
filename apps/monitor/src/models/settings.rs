use serde::{Deserialize, Serialize};

/// User-editable settings. The engine only reads the notification toggles
/// and addresses, the rest is carried for the status page and dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub email_notifications: bool,
    pub alert_email: String,
    pub telegram_notifications: bool,
    pub telegram_chat_id: String,
    pub slack_webhook: String,
    pub retention_days: u32,
    pub status_page_title: String,
    pub branding_color: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            email_notifications: true,
            alert_email: String::new(),
            telegram_notifications: false,
            telegram_chat_id: String::new(),
            slack_webhook: String::new(),
            retention_days: 30,
            status_page_title: "System Status Page".to_string(),
            branding_color: "#10b981".to_string(),
        }
    }
}
