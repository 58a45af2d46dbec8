use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{Destination, NotificationError, NotificationTransport};

#[derive(Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct TelegramMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Serialize)]
struct EmailMessage<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Upper bound for one delivery request, connect included
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends alerts over HTTP: Slack incoming webhooks, the Telegram Bot API and
/// an email relay accepting JSON.
pub struct HttpTransport {
    client: Client,
    email_relay_url: Option<String>,
    telegram_bot_token: Option<String>,
    telegram_api_base: String,
}

impl HttpTransport {
    pub fn new(email_relay_url: Option<String>, telegram_bot_token: Option<String>) -> Self {
        Self {
            client: build_client(DELIVERY_TIMEOUT),
            email_relay_url: email_relay_url.filter(|url| !url.trim().is_empty()),
            telegram_bot_token: telegram_bot_token.filter(|token| !token.trim().is_empty()),
            telegram_api_base: "https://api.telegram.org".to_string(),
        }
    }

    /// Give up on a delivery after `timeout` instead of [`DELIVERY_TIMEOUT`]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    /// Point Telegram calls somewhere other than api.telegram.org
    pub fn with_telegram_api_base(mut self, base: impl Into<String>) -> Self {
        self.telegram_api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        channel: &'static str,
        url: &str,
        payload: &T,
    ) -> Result<(), NotificationError> {
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(NotificationError::Rejected {
                channel,
                reason: format!("status {status}: {body}"),
            });
        }

        Ok(())
    }
}

fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

#[async_trait]
impl NotificationTransport for HttpTransport {
    async fn send(
        &self,
        destination: &Destination,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        match destination {
            Destination::Slack { webhook } => {
                let text = format!("*{subject}*\n{body}");
                self.post("slack", webhook, &SlackMessage { text: &text }).await
            }
            Destination::Telegram { chat_id } => {
                let token = self
                    .telegram_bot_token
                    .as_deref()
                    .ok_or(NotificationError::NotConfigured("telegram"))?;
                let url = format!("{}/bot{token}/sendMessage", self.telegram_api_base);
                let text = format!("{subject}\n\n{body}");
                self.post("telegram", &url, &TelegramMessage { chat_id, text: &text }).await
            }
            Destination::Email { address } => {
                let relay = self
                    .email_relay_url
                    .as_deref()
                    .ok_or(NotificationError::NotConfigured("email"))?;
                self.post("email", relay, &EmailMessage { to: address, subject, body }).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Accept one request, hand its raw text back and answer with `status_line`
    async fn capture_one(status_line: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some((head, body)) = text.split_once("\r\n\r\n") {
                    let length = head
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if body.len() >= length {
                        break;
                    }
                }
            }
            let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = tx.send(String::from_utf8_lossy(&request).to_string());
        });
        (format!("http://{addr}"), rx)
    }

    #[tokio::test]
    async fn test_slack_posts_text_payload() {
        let (base, request) = capture_one("HTTP/1.1 200 OK").await;
        let transport = HttpTransport::new(None, None);
        let destination = Destination::Slack { webhook: format!("{base}/hook") };

        transport.send(&destination, "URGENT", "API is down").await.unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /hook"));
        assert!(request.contains(r#"{"text":"*URGENT*\nAPI is down"}"#));
    }

    #[tokio::test]
    async fn test_telegram_uses_bot_token_from_config() {
        let (base, request) = capture_one("HTTP/1.1 200 OK").await;
        let transport =
            HttpTransport::new(None, Some("123:abc".to_string())).with_telegram_api_base(base);
        let destination = Destination::Telegram { chat_id: "42".to_string() };

        transport.send(&destination, "URGENT", "down").await.unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /bot123:abc/sendMessage"));
        assert!(request.contains(r#""chat_id":"42""#));
    }

    #[tokio::test]
    async fn test_missing_configuration_is_reported() {
        let transport = HttpTransport::new(Some("  ".to_string()), None);

        let email = Destination::Email { address: "ops@example.com".to_string() };
        assert!(matches!(
            transport.send(&email, "s", "b").await,
            Err(NotificationError::NotConfigured("email"))
        ));

        let telegram = Destination::Telegram { chat_id: "42".to_string() };
        assert!(matches!(
            transport.send(&telegram, "s", "b").await,
            Err(NotificationError::NotConfigured("telegram"))
        ));
    }

    #[tokio::test]
    async fn test_silent_webhook_times_out() {
        // Accepts the connection and never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let transport = HttpTransport::new(None, None).with_timeout(Duration::from_millis(200));
        let destination = Destination::Slack { webhook: format!("http://{addr}/hook") };

        let outcome =
            tokio::time::timeout(Duration::from_secs(5), transport.send(&destination, "s", "b"))
                .await
                .expect("delivery should give up on its own");
        assert!(matches!(outcome, Err(NotificationError::Transport(_))));
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let (base, _request) = capture_one("HTTP/1.1 500 Internal Server Error").await;
        let transport = HttpTransport::new(Some(format!("{base}/send")), None);
        let email = Destination::Email { address: "ops@example.com".to_string() };

        assert!(matches!(
            transport.send(&email, "s", "b").await,
            Err(NotificationError::Rejected { channel: "email", .. })
        ));
    }
}
