use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::checker::{Checker, HttpChecker, PingChecker, ProbeError};
use super::types::{CheckResult, ProbeKind};

/// Floor for the per-probe timeout, even for one-second intervals
const MIN_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Probe executor - performs one health check against one target.
///
/// No retries, every tick is an independent sample.
pub struct ProbeExecutor {
    http_checker: Arc<dyn Checker>,
    ping_checker: Arc<dyn Checker>,
    max_timeout: Duration,
}

impl ProbeExecutor {
    /// Create an executor backed by the real HTTP and TCP checkers
    pub fn new(user_agent: &str, max_timeout: Duration) -> Result<Self, ProbeError> {
        Ok(Self::with_checkers(
            Arc::new(HttpChecker::new(user_agent)?),
            Arc::new(PingChecker::new()),
            max_timeout,
        ))
    }

    /// Create an executor from explicit checkers
    pub fn with_checkers(
        http_checker: Arc<dyn Checker>,
        ping_checker: Arc<dyn Checker>,
        max_timeout: Duration,
    ) -> Self {
        Self { http_checker, ping_checker, max_timeout }
    }

    /// Timeout for a monitor checked every `interval`.
    ///
    /// Always strictly below the interval so a hung probe cannot overlap the
    /// monitor's next due time.
    pub fn timeout_for(&self, interval: Duration) -> Duration {
        let below_interval = interval
            .saturating_sub(Duration::from_secs(1))
            .max(MIN_PROBE_TIMEOUT);
        self.max_timeout.min(below_interval)
    }

    /// Execute a single probe dispatched at `dispatched_at`
    pub async fn probe(
        &self,
        target: &str,
        kind: ProbeKind,
        timeout: Duration,
        dispatched_at: DateTime<Utc>,
    ) -> CheckResult {
        let checker: &dyn Checker = match kind {
            ProbeKind::Http => self.http_checker.as_ref(),
            ProbeKind::Ping => self.ping_checker.as_ref(),
        };

        let start = Instant::now();
        let outcome = match tokio::time::timeout(timeout, checker.check(target, timeout)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProbeError::Timeout(timeout.as_millis())),
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(success) => {
                let result = CheckResult::up(dispatched_at, latency_ms)
                    .with_status_code(success.status_code);
                match success.status_code {
                    Some(code) => result.with_message(format!("HTTP {code}")),
                    None => result.with_message("Reachable"),
                }
            }
            Err(ProbeError::Status(code)) => {
                CheckResult::down(dispatched_at, latency_ms, ProbeError::Status(code).to_string())
                    .with_status_code(Some(code))
            }
            Err(e) => CheckResult::down(dispatched_at, latency_ms, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::ProbeStatus;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `response` verbatim to every connection
    async fn serve(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}/health")
    }

    fn executor() -> ProbeExecutor {
        ProbeExecutor::new("uppe-test", Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn test_timeout_is_below_interval() {
        let executor = executor();
        for secs in [1, 2, 5, 15, 60, 3600] {
            let interval = Duration::from_secs(secs);
            let timeout = executor.timeout_for(interval);
            assert!(timeout < interval, "{timeout:?} not below {interval:?}");
            assert!(timeout <= Duration::from_secs(10));
        }
        assert_eq!(executor.timeout_for(Duration::from_secs(60)), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_http_probe_up() {
        let url = serve("HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;

        let result = executor().probe(&url, ProbeKind::Http, Duration::from_secs(2), Utc::now()).await;

        assert_eq!(result.status, ProbeStatus::Up);
        assert_eq!(result.status_code, Some(200));
    }

    #[tokio::test]
    async fn test_http_probe_server_error_is_down() {
        let url = serve(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let result = executor().probe(&url, ProbeKind::Http, Duration::from_secs(2), Utc::now()).await;

        assert_eq!(result.status, ProbeStatus::Down);
        assert_eq!(result.status_code, Some(503));
        assert_eq!(result.message.as_deref(), Some("HTTP status 503"));
    }

    #[tokio::test]
    async fn test_http_probe_hung_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let dispatched_at = Utc::now();
        let result = executor()
            .probe(&format!("http://{addr}/"), ProbeKind::Http, Duration::from_millis(300), dispatched_at)
            .await;

        assert_eq!(result.status, ProbeStatus::Down);
        assert_eq!(result.timestamp, dispatched_at);
        assert!(result.latency_ms < 2_000);
    }

    #[tokio::test]
    async fn test_ping_probe_unreachable_is_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = executor()
            .probe(&addr.to_string(), ProbeKind::Ping, Duration::from_secs(1), Utc::now())
            .await;

        assert_eq!(result.status, ProbeStatus::Down);
        assert!(result.message.is_some());
    }
}
