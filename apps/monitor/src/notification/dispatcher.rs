use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{Destination, NotificationTransport};
use crate::models::{Incident, Monitor, Settings};

/// How long [`NotificationDispatcher::flush`] waits before abandoning
/// deliveries still running
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fires alerts for newly opened incidents.
///
/// Delivery happens on background tasks so a slow or failing transport
/// never holds up the scheduler. Failures are logged and dropped.
pub struct NotificationDispatcher {
    transport: Arc<dyn NotificationTransport>,
    pending: Mutex<JoinSet<()>>,
    flush_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn NotificationTransport>) -> Self {
        Self { transport, pending: Mutex::new(JoinSet::new()), flush_timeout: FLUSH_TIMEOUT }
    }

    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn subject(monitor: &Monitor) -> String {
        format!("URGENT: Incident detected for {}", monitor.name)
    }

    pub fn body(monitor: &Monitor, incident: &Incident) -> String {
        let mut body = format!(
            "Monitor \"{}\" ({}) is DOWN since {}.",
            monitor.name,
            monitor.target,
            incident.started_at.to_rfc3339()
        );
        if let Some(cause) = &incident.cause {
            body.push_str(&format!("\nCause: {cause}"));
        }
        body
    }

    /// Queue a down alert to every destination enabled in `settings`.
    ///
    /// Returns the number of deliveries queued, zero when alerts are off.
    pub async fn notify_down(
        &self,
        monitor: &Monitor,
        incident: &Incident,
        settings: &Settings,
    ) -> usize {
        let destinations = Destination::from_settings(settings);
        if destinations.is_empty() {
            debug!(monitor = %monitor.id, "No notification destination configured");
            return 0;
        }

        let queued = destinations.len();
        let subject = Self::subject(monitor);
        let body = Self::body(monitor, incident);
        let transport = Arc::clone(&self.transport);
        let monitor_id = monitor.id;

        let mut pending = self.pending.lock().await;
        // Reap deliveries that already finished
        while pending.try_join_next().is_some() {}

        pending.spawn(async move {
            let sends = destinations.iter().map(|destination| {
                let transport = Arc::clone(&transport);
                let subject = subject.as_str();
                let body = body.as_str();
                async move { (destination, transport.send(destination, subject, body).await) }
            });

            for (destination, outcome) in join_all(sends).await {
                match outcome {
                    Ok(()) => info!(monitor = %monitor_id, %destination, "Alert delivered"),
                    Err(e) => warn!(
                        monitor = %monitor_id,
                        %destination,
                        error = %e,
                        "Failed to deliver alert"
                    ),
                }
            }
        });

        queued
    }

    /// Wait for the deliveries queued so far, abandoning whatever is still
    /// running after the flush timeout.
    ///
    /// The queue is taken out of the lock first, so new alerts can be queued
    /// while this waits.
    pub async fn flush(&self) {
        let mut pending = std::mem::take(&mut *self.pending.lock().await);

        let drained = tokio::time::timeout(self.flush_timeout, async {
            while let Some(joined) = pending.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Notification task failed");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(abandoned = pending.len(), "Gave up waiting for alert deliveries");
            pending.abort_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMonitor;
    use crate::monitoring::types::ProbeKind;
    use crate::notification::NotificationError;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    #[derive(Default)]
    struct Recorder {
        sent: std::sync::Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationTransport for Recorder {
        async fn send(
            &self,
            destination: &Destination,
            subject: &str,
            _body: &str,
        ) -> Result<(), NotificationError> {
            self.sent.lock().unwrap().push((destination.channel().to_string(), subject.to_string()));
            if self.fail {
                return Err(NotificationError::NotConfigured("email"));
            }
            Ok(())
        }
    }

    /// Never completes a delivery
    struct Stalled;

    #[async_trait]
    impl NotificationTransport for Stalled {
        async fn send(
            &self,
            _destination: &Destination,
            _subject: &str,
            _body: &str,
        ) -> Result<(), NotificationError> {
            std::future::pending::<Result<(), NotificationError>>().await
        }
    }

    fn fixture() -> (Monitor, Incident) {
        let monitor = Monitor::new(
            NewMonitor::new("API", "https://api.example.com", ProbeKind::Http, 60),
            Utc.timestamp_opt(0, 0).unwrap(),
        )
        .unwrap();
        let incident =
            Incident::open(&monitor, Utc.timestamp_opt(60, 0).unwrap(), Some("HTTP status 503".into()));
        (monitor, incident)
    }

    fn alerting_settings() -> Settings {
        Settings {
            alert_email: "ops@example.com".to_string(),
            slack_webhook: "https://hooks.slack.com/services/T/B/X".to_string(),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_sends_to_every_destination() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = NotificationDispatcher::new(recorder.clone());
        let (monitor, incident) = fixture();

        assert_eq!(dispatcher.notify_down(&monitor, &incident, &alerting_settings()).await, 2);
        dispatcher.flush().await;

        let mut sent = recorder.sent.lock().unwrap().clone();
        sent.sort();
        assert_eq!(
            sent,
            vec![
                ("email".to_string(), "URGENT: Incident detected for API".to_string()),
                ("slack".to_string(), "URGENT: Incident detected for API".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_destination_is_a_noop() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = NotificationDispatcher::new(recorder.clone());
        let (monitor, incident) = fixture();

        assert_eq!(dispatcher.notify_down(&monitor, &incident, &Settings::default()).await, 0);
        dispatcher.flush().await;
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let recorder = Arc::new(Recorder { fail: true, ..Recorder::default() });
        let dispatcher = NotificationDispatcher::new(recorder.clone());
        let (monitor, incident) = fixture();

        dispatcher.notify_down(&monitor, &incident, &alerting_settings()).await;
        dispatcher.flush().await;
        assert_eq!(recorder.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_flush_gives_up_on_stalled_delivery() {
        let dispatcher = NotificationDispatcher::new(Arc::new(Stalled))
            .with_flush_timeout(Duration::from_millis(100));
        let (monitor, incident) = fixture();

        dispatcher.notify_down(&monitor, &incident, &alerting_settings()).await;
        tokio::time::timeout(Duration::from_secs(5), dispatcher.flush())
            .await
            .expect("flush should be bounded");

        // Nothing left to wait for afterwards
        tokio::time::timeout(Duration::from_secs(1), dispatcher.flush()).await.unwrap();
    }

    #[tokio::test]
    async fn test_alerts_queue_while_flush_waits() {
        let dispatcher = Arc::new(
            NotificationDispatcher::new(Arc::new(Stalled))
                .with_flush_timeout(Duration::from_secs(60)),
        );
        let (monitor, incident) = fixture();
        dispatcher.notify_down(&monitor, &incident, &alerting_settings()).await;

        let flushing = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.flush().await })
        };
        tokio::task::yield_now().await;

        let queued = tokio::time::timeout(
            Duration::from_secs(1),
            dispatcher.notify_down(&monitor, &incident, &alerting_settings()),
        )
        .await
        .expect("notify_down must not wait for a running flush");
        assert_eq!(queued, 2);

        flushing.abort();
    }

    #[test]
    fn test_body_mentions_target_and_cause() {
        let (monitor, incident) = fixture();
        let body = NotificationDispatcher::body(&monitor, &incident);
        assert!(body.contains("https://api.example.com"));
        assert!(body.contains("Cause: HTTP status 503"));
    }
}
