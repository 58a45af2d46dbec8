//! Free-text diagnostics for a monitor, produced by an external summarizer.
//!
//! The summarizer is opaque and best-effort: whatever goes wrong on its side,
//! callers always get a string back.

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::models::Monitor;
use crate::monitoring::types::CheckResult;

/// Number of most recent checks handed to the summarizer
pub const DIAGNOSTIC_WINDOW: usize = 10;

pub const EMPTY_ANALYSIS: &str = "No analysis available.";
pub const FAILED_ANALYSIS: &str =
    "Failed to generate AI diagnostic. Please check your API configuration.";

/// What the summarizer gets to see about a monitor
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticContext {
    pub monitor_name: String,
    pub target: String,
    pub recent_history: Vec<CheckResult>,
}

impl DiagnosticContext {
    pub fn from_monitor(monitor: &Monitor) -> Self {
        Self {
            monitor_name: monitor.name.clone(),
            target: monitor.target.clone(),
            recent_history: monitor.history.recent(DIAGNOSTIC_WINDOW),
        }
    }

    pub fn prompt(&self) -> String {
        let history =
            serde_json::to_string(&self.recent_history).unwrap_or_else(|_| "[]".to_string());
        format!(
            "Analyze the following uptime monitoring data for a service named \"{}\" ({}).\n\
             Recent History: {history}\n\n\
             Provide a concise (2-3 sentences) diagnostic report.\n\
             If the service is down, suggest likely causes based on common networking or server issues.\n\
             If the service is up but slow, suggest optimization tips.\n\
             Format the response with professional tone.",
            self.monitor_name, self.target
        )
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, context: &DiagnosticContext) -> anyhow::Result<String>;
}

/// Run the summarizer, mapping every failure onto a fixed message
pub async fn diagnose(summarizer: &dyn Summarizer, context: &DiagnosticContext) -> String {
    match summarizer.summarize(context).await {
        Ok(text) if text.trim().is_empty() => EMPTY_ANALYSIS.to_string(),
        Ok(text) => text,
        Err(e) => {
            warn!(monitor = %context.monitor_name, error = %e, "Diagnostic summarizer failed");
            FAILED_ANALYSIS.to_string()
        }
    }
}

#[derive(Serialize)]
struct SummaryRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    text: String,
}

/// Summarizer speaking a minimal JSON protocol: POST `{"prompt"}`, read
/// `{"text"}` back.
pub struct HttpSummarizer {
    client: Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl HttpSummarizer {
    pub fn new(endpoint: Option<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, endpoint, api_key }
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, context: &DiagnosticContext) -> anyhow::Result<String> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            bail!("no diagnostics endpoint configured");
        };

        let prompt = context.prompt();
        let mut request = self.client.post(endpoint).json(&SummaryRequest { prompt: &prompt });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .context("failed to reach diagnostics endpoint")?
            .error_for_status()?;
        let summary: SummaryResponse =
            response.json().await.context("invalid diagnostics response")?;
        Ok(summary.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMonitor;
    use crate::monitoring::types::ProbeKind;
    use chrono::{TimeZone, Utc};

    struct Fixed(anyhow::Result<String>);

    #[async_trait]
    impl Summarizer for Fixed {
        async fn summarize(&self, _context: &DiagnosticContext) -> anyhow::Result<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    fn context() -> DiagnosticContext {
        let mut monitor = Monitor::new(
            NewMonitor::new("API", "https://api.example.com", ProbeKind::Http, 60),
            Utc.timestamp_opt(0, 0).unwrap(),
        )
        .unwrap();
        for i in 0..15 {
            monitor.history.append(CheckResult::up(Utc.timestamp_opt(i * 60, 0).unwrap(), i as u64));
        }
        DiagnosticContext::from_monitor(&monitor)
    }

    #[test]
    fn test_context_keeps_last_ten_checks() {
        let context = context();
        assert_eq!(context.recent_history.len(), DIAGNOSTIC_WINDOW);
        assert_eq!(context.recent_history[0].latency_ms, 5);
        assert_eq!(context.recent_history[9].latency_ms, 14);
        assert!(context.prompt().contains("\"API\" (https://api.example.com)"));
    }

    #[tokio::test]
    async fn test_fallbacks() {
        let context = context();

        assert_eq!(diagnose(&Fixed(Ok("Looks healthy.".into())), &context).await, "Looks healthy.");
        assert_eq!(diagnose(&Fixed(Ok("  ".into())), &context).await, EMPTY_ANALYSIS);
        assert_eq!(
            diagnose(&Fixed(Err(anyhow::anyhow!("quota exceeded"))), &context).await,
            FAILED_ANALYSIS
        );
    }

    #[tokio::test]
    async fn test_unconfigured_http_summarizer_falls_back() {
        let summarizer = HttpSummarizer::new(None, None);
        assert_eq!(diagnose(&summarizer, &context()).await, FAILED_ANALYSIS);
    }
}
