//! Protocol probes and the status classifier

use crate::config::Config;
use crate::diag::DiagLog;
use crate::errors::{MonitorError, Result};
use crate::service::{ServiceKind, ServiceSpec, Status};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// One protocol check. Success means the service answered; any error is
/// normalized to offline by the classifier.
#[async_trait]
pub trait ProbeAdapter: Send + Sync {
    async fn probe(&self, spec: &ServiceSpec) -> Result<()>;
}

/// Website probe: a plain GET that must return a success status.
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProbeAdapter for HttpProbe {
    async fn probe(&self, spec: &ServiceSpec) -> Result<()> {
        let response = self.client.get(&spec.address).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(MonitorError::Probe(format!(
                "{} returned {}",
                spec.address,
                response.status()
            )))
        }
    }
}

/// Game-server probe: delegates to a third-party status API and requires its
/// `online` flag to be true.
pub struct GameServerProbe {
    client: Client,
    status_api: String,
}

impl GameServerProbe {
    pub fn new(client: Client, status_api: String) -> Self {
        Self { client, status_api }
    }
}

#[async_trait]
impl ProbeAdapter for GameServerProbe {
    async fn probe(&self, spec: &ServiceSpec) -> Result<()> {
        let url = format!("{}/{}", self.status_api.trim_end_matches('/'), spec.address);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(MonitorError::Probe(format!(
                "status API returned {} for {}",
                response.status(),
                spec.address
            )));
        }

        let body: Value = response.json().await?;
        if body["online"].as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(MonitorError::Probe(format!(
                "status API reports {} not online",
                spec.address
            )))
        }
    }
}

/// TCP probe: a connect attempt under a bounded timeout.
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProbeAdapter for TcpProbe {
    async fn probe(&self, spec: &ServiceSpec) -> Result<()> {
        let port = spec
            .port
            .ok_or_else(|| MonitorError::Config(format!("{} has no port", spec.name)))?;
        let addr = format!("{}:{}", spec.address, port);

        match timeout(self.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(MonitorError::Probe(format!(
                "TCP connect to {} failed: {}",
                addr, e
            ))),
            Err(_) => Err(MonitorError::Probe(format!(
                "TCP connect to {} timed out",
                addr
            ))),
        }
    }
}

/// UDP probe. UDP has no delivery confirmation: a successful send only
/// proves the local socket and route are viable, never remote liveness.
pub struct UdpProbe;

#[async_trait]
impl ProbeAdapter for UdpProbe {
    async fn probe(&self, spec: &ServiceSpec) -> Result<()> {
        let port = spec
            .port
            .ok_or_else(|| MonitorError::Config(format!("{} has no port", spec.name)))?;

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.send_to(b"ping", (spec.address.as_str(), port)).await?;
        Ok(())
    }
}

/// Host-reachability probe: one ICMP echo via the system ping binary.
pub struct PingProbe {
    timeout_secs: u64,
}

impl PingProbe {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

#[async_trait]
impl ProbeAdapter for PingProbe {
    async fn probe(&self, spec: &ServiceSpec) -> Result<()> {
        let output = Command::new("ping")
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg(self.timeout_secs.to_string())
            .arg(&spec.address)
            .output()
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(MonitorError::Probe(format!(
                "ping to {} failed: {}",
                spec.address,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

/// Classifies one poll result per service: maintenance override first, then
/// the protocol probe, with every failure logged and normalized to offline.
pub struct StatusClassifier {
    website: Box<dyn ProbeAdapter>,
    game_server: Box<dyn ProbeAdapter>,
    tcp: Box<dyn ProbeAdapter>,
    udp: Box<dyn ProbeAdapter>,
    host: Box<dyn ProbeAdapter>,
    diag: DiagLog,
}

impl StatusClassifier {
    pub fn new(config: &Config, diag: DiagLog) -> Result<Self> {
        let probe_timeout = Duration::from_secs(config.probe_timeout_secs);
        let client = Client::builder()
            .timeout(probe_timeout)
            .user_agent(format!("uptime-monitor/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(MonitorError::Http)?;

        Ok(Self {
            website: Box::new(HttpProbe::new(client.clone())),
            game_server: Box::new(GameServerProbe::new(
                client,
                config.game_status_api.clone(),
            )),
            tcp: Box::new(TcpProbe::new(probe_timeout)),
            udp: Box::new(UdpProbe),
            host: Box::new(PingProbe::new(config.probe_timeout_secs)),
            diag,
        })
    }

    /// Swap in a different adapter for one protocol.
    pub fn with_adapter(mut self, kind: ServiceKind, adapter: Box<dyn ProbeAdapter>) -> Self {
        match kind {
            ServiceKind::Website => self.website = adapter,
            ServiceKind::GameServer => self.game_server = adapter,
            ServiceKind::Tcp => self.tcp = adapter,
            ServiceKind::Udp => self.udp = adapter,
            ServiceKind::HostReachability => self.host = adapter,
        }
        self
    }

    /// Classify one service. The maintenance flag wins unconditionally and
    /// no probe runs for it.
    pub async fn classify(&self, spec: &ServiceSpec) -> Status {
        if spec.maintenance {
            return Status::Maintenance;
        }

        match self.adapter_for(spec.kind).probe(spec).await {
            Ok(()) => Status::Online,
            Err(e) => {
                debug!("Probe for {} failed: {}", spec.name, e);
                self.diag
                    .record(&format!("probe failed for {}", spec.name), &e.to_string())
                    .await;
                Status::Offline
            }
        }
    }

    fn adapter_for(&self, kind: ServiceKind) -> &dyn ProbeAdapter {
        match kind {
            ServiceKind::Website => self.website.as_ref(),
            ServiceKind::GameServer => self.game_server.as_ref(),
            ServiceKind::Tcp => self.tcp.as_ref(),
            ServiceKind::Udp => self.udp.as_ref(),
            ServiceKind::HostReachability => self.host.as_ref(),
        }
    }
}
