use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use surge_ping::{Client, Config as PingConfig, ICMP, PingIdentifier, PingSequence};
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use super::types::ProbeOutcome;

/// Number of echo requests sent per ping probe
pub const PING_COUNT: u16 = 3;

/// Checker trait for different types of monitoring checks
///
/// A probe failure is an outcome, not an error: implementations classify it
/// as down with a readable message.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Probe `target`, bounding network waits by `timeout`
    async fn check(&self, target: &str, timeout: Duration) -> ProbeOutcome;

    /// Worst-case wall time the probe may legitimately take for `timeout`
    fn deadline(&self, timeout: Duration) -> Duration {
        timeout
    }
}

/// Strategy table keyed by protocol identifier
#[derive(Clone, Default)]
pub struct CheckerRegistry {
    checkers: HashMap<String, Arc<dyn Checker>>,
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in HTTP, TCP and ICMP strategies
    pub fn with_defaults() -> anyhow::Result<Self> {
        let http: Arc<dyn Checker> = Arc::new(HttpChecker::new()?);
        let icmp: Arc<dyn Checker> = Arc::new(IcmpChecker::new());

        let mut registry = Self::new();
        registry.register("http", http.clone());
        registry.register("https", http);
        registry.register("tcp", Arc::new(TcpChecker));
        registry.register("ping", icmp.clone());
        registry.register("icmp", icmp);
        Ok(registry)
    }

    /// Register (or replace) the strategy for a protocol kind
    pub fn register(&mut self, kind: &str, checker: Arc<dyn Checker>) {
        self.checkers.insert(kind.to_ascii_lowercase(), checker);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Checker>> {
        self.checkers.get(&kind.to_ascii_lowercase()).cloned()
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.checkers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, target: &str, timeout: Duration) -> ProbeOutcome {
        let response = match self.client.get(target).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => return ProbeOutcome::down(e.to_string()),
        };

        let code = response.status().as_u16();

        // Consider 2xx and 3xx as success
        if (200..400).contains(&code) {
            ProbeOutcome::up("OK").with_status_code(code)
        } else {
            ProbeOutcome::down(format!("HTTP {code}")).with_status_code(code)
        }
    }
}

/// TCP port checker
pub struct TcpChecker;

impl TcpChecker {
    /// Extract `host:port` from either `tcp://host:port` or a bare `host:port`
    pub fn parse_address(target: &str) -> Result<String, String> {
        let target = target.trim();

        let address = if target.starts_with("tcp://") {
            let url = Url::parse(target).map_err(|e| format!("invalid TCP URL: {e}"))?;
            match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{host}:{port}"),
                (Some(host), None) => {
                    return Err(format!("TCP check requires host:port format, got: {host}"));
                }
                (None, _) => String::new(),
            }
        } else {
            target.to_string()
        };

        if address.is_empty() {
            return Err("no host:port specified".to_string());
        }

        // host:port, where an IPv6 host must be bracketed
        let has_port = match address.rsplit_once(':') {
            Some((host, port)) => {
                !host.is_empty()
                    && port.parse::<u16>().is_ok()
                    && (!host.contains(':') || host.ends_with(']'))
            }
            None => false,
        };
        if !has_port {
            return Err(format!("TCP check requires host:port format, got: {address}"));
        }

        Ok(address)
    }
}

#[async_trait::async_trait]
impl Checker for TcpChecker {
    async fn check(&self, target: &str, timeout_duration: Duration) -> ProbeOutcome {
        let address = match Self::parse_address(target) {
            Ok(address) => address,
            Err(message) => return ProbeOutcome::down(message),
        };

        let connect = tokio::net::TcpStream::connect(address.as_str());

        match timeout(timeout_duration, connect).await {
            Ok(Ok(_stream)) => ProbeOutcome::up(format!("TCP connection successful to {address}")),
            Ok(Err(e)) => ProbeOutcome::down(format!("TCP connection failed to {address}: {e}")),
            Err(_) => ProbeOutcome::down(format!(
                "TCP connection failed to {address}: timed out after {}s",
                timeout_duration.as_secs()
            )),
        }
    }
}

/// ICMP ping checker using unprivileged datagram sockets
pub struct IcmpChecker {
    count: u16,
}

impl Default for IcmpChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl IcmpChecker {
    pub fn new() -> Self {
        Self { count: PING_COUNT }
    }

    /// Host part of `ping://host`, a bare host name or an IP literal
    pub fn parse_host(target: &str) -> Option<String> {
        let target = target.trim();
        let host = if target.contains("://") {
            Url::parse(target).ok()?.host_str()?.to_string()
        } else {
            target.trim_end_matches('/').to_string()
        };
        let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        (!host.is_empty()).then_some(host)
    }

    async fn resolve(host: &str) -> Result<IpAddr, String> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }
        let mut addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| format!("failed to resolve {host}: {e}"))?;
        addrs
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| format!("failed to resolve {host}: no addresses"))
    }
}

#[async_trait::async_trait]
impl Checker for IcmpChecker {
    async fn check(&self, target: &str, timeout: Duration) -> ProbeOutcome {
        let Some(host) = Self::parse_host(target) else {
            return ProbeOutcome::down(format!("invalid ping target: {target}"));
        };

        let ip = match Self::resolve(&host).await {
            Ok(ip) => ip,
            Err(message) => return ProbeOutcome::down(message),
        };

        let config = match ip {
            IpAddr::V4(_) => PingConfig::default(),
            IpAddr::V6(_) => PingConfig::builder().kind(ICMP::V6).build(),
        };
        let client = match Client::new(&config) {
            Ok(client) => client,
            Err(e) => return ProbeOutcome::down(format!("failed to open ICMP socket: {e}")),
        };

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(timeout);

        let payload = [0u8; 56];
        let mut rtts = Vec::with_capacity(self.count as usize);
        for seq in 0..self.count {
            match pinger.ping(PingSequence(seq), &payload).await {
                Ok((_packet, rtt)) => rtts.push(rtt),
                Err(e) => debug!(host = %host, seq, error = %e, "Echo request failed"),
            }
        }

        if rtts.is_empty() {
            return ProbeOutcome::down("no packets received");
        }

        let avg = rtts.iter().sum::<Duration>() / rtts.len() as u32;
        ProbeOutcome::up(format!("Ping successful, avg RTT: {avg:?}"))
            .with_latency_override(avg.as_millis() as u64)
    }

    /// Every echo may wait the full timeout, so the worst case is `timeout × count`.
    fn deadline(&self, timeout: Duration) -> Duration {
        timeout.saturating_mul(u32::from(self.count))
    }
}
