use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Why a probe could not reach its target. Always converted into a `down`
/// check result, never surfaced to callers of the engine.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("failed to resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("timed out after {0}ms")]
    Timeout(u128),
}

/// What a successful probe observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeSuccess {
    pub status_code: Option<u16>,
}

/// Checker trait for the different kinds of reachability probes
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Probe `target` once, giving up after `timeout`
    async fn check(&self, target: &str, timeout: Duration) -> Result<ProbeSuccess, ProbeError>;
}

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new(user_agent: &str) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, target: &str, timeout: Duration) -> Result<ProbeSuccess, ProbeError> {
        let response = self.client.get(target).timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(timeout.as_millis())
            } else if e.is_connect() {
                ProbeError::Connect(e.to_string())
            } else {
                ProbeError::Request(e.to_string())
            }
        })?;

        let status = response.status();

        // Consider 2xx and 3xx as success
        if status.is_success() || status.is_redirection() {
            Ok(ProbeSuccess { status_code: Some(status.as_u16()) })
        } else {
            Err(ProbeError::Status(status.as_u16()))
        }
    }
}

/// Lightweight reachability checker.
///
/// Opens a TCP connection instead of sending ICMP echo requests, which would
/// need raw sockets and elevated privileges.
pub struct PingChecker;

impl PingChecker {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PingChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Checker for PingChecker {
    async fn check(&self, target: &str, timeout: Duration) -> Result<ProbeSuccess, ProbeError> {
        let (host, port) = ping_address(target)?;

        let connect = tokio::net::TcpStream::connect((host.as_str(), port));

        tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| ProbeError::Timeout(timeout.as_millis()))?
            .map_err(|e| ProbeError::Connect(format!("{host}:{port}: {e}")))?;

        Ok(ProbeSuccess::default())
    }
}

/// Split a ping target into host and port.
///
/// Accepts `host`, `host:port`, `[v6]:port` and http(s) URLs. A bare host
/// is probed on port 80.
pub fn ping_address(target: &str) -> Result<(String, u16), ProbeError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ProbeError::InvalidTarget("empty target".to_string()));
    }

    if target.contains("://") {
        let url = Url::parse(target).map_err(|e| ProbeError::InvalidTarget(e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| ProbeError::InvalidTarget(format!("{target} has no host")))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = url.port_or_known_default().unwrap_or(80);
        return Ok((host, port));
    }

    if let Some(rest) = target.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| ProbeError::InvalidTarget(format!("unterminated IPv6 literal: {target}")))?;
        let port = match tail.strip_prefix(':') {
            Some(port) => parse_port(port)?,
            None => 80,
        };
        return Ok((host.to_string(), port));
    }

    match target.rsplit_once(':') {
        // A second colon means a bare IPv6 address
        Some((host, port)) if !host.contains(':') => Ok((host.to_string(), parse_port(port)?)),
        _ => Ok((target.to_string(), 80)),
    }
}

fn parse_port(port: &str) -> Result<u16, ProbeError> {
    port.parse().map_err(|_| ProbeError::InvalidTarget(format!("invalid port: {port}")))
}
