//! Service records and the runtime status registry

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Availability state of a monitored service.
///
/// `Unknown` is a pre-history sentinel: it is the state before the first
/// classification result arrives and is never written to history.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Unknown,
    Online,
    Offline,
    Maintenance,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Unknown => write!(f, "unknown"),
            Status::Online => write!(f, "online"),
            Status::Offline => write!(f, "offline"),
            Status::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// Protocol used to probe a service.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    Website,
    GameServer,
    Tcp,
    Udp,
    HostReachability,
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::Website => write!(f, "website"),
            ServiceKind::GameServer => write!(f, "game-server"),
            ServiceKind::Tcp => write!(f, "tcp"),
            ServiceKind::Udp => write!(f, "udp"),
            ServiceKind::HostReachability => write!(f, "host-reachability"),
        }
    }
}

/// Static description of a monitored service, built from configuration at
/// startup and immutable afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub kind: ServiceKind,
    pub address: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub maintenance: bool,
    #[serde(default)]
    pub tooltip: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// A service together with its current runtime status.
#[derive(Clone, Debug)]
pub struct Service {
    pub spec: ServiceSpec,
    pub current_status: Status,
}

impl Service {
    pub fn new(spec: ServiceSpec) -> Self {
        Self {
            spec,
            current_status: Status::Unknown,
        }
    }
}

/// Owns every monitored service record. Status mutation goes through the
/// transition engine only; everything else reads snapshots.
pub struct Registry {
    services: RwLock<Vec<Service>>,
}

impl Registry {
    pub fn new(specs: Vec<ServiceSpec>) -> Self {
        Self {
            services: RwLock::new(specs.into_iter().map(Service::new).collect()),
        }
    }

    /// Consistent copy of every service record.
    pub async fn snapshot(&self) -> Vec<Service> {
        self.services.read().await.clone()
    }

    /// The static specs, in configuration order.
    pub async fn specs(&self) -> Vec<ServiceSpec> {
        self.services
            .read()
            .await
            .iter()
            .map(|service| service.spec.clone())
            .collect()
    }

    pub async fn status_of(&self, name: &str) -> Option<Status> {
        self.services
            .read()
            .await
            .iter()
            .find(|service| service.spec.name == name)
            .map(|service| service.current_status)
    }

    pub async fn spec_of(&self, name: &str) -> Option<ServiceSpec> {
        self.services
            .read()
            .await
            .iter()
            .find(|service| service.spec.name == name)
            .map(|service| service.spec.clone())
    }

    pub(crate) async fn set_status(&self, name: &str, status: Status) -> bool {
        let mut services = self.services.write().await;
        match services.iter_mut().find(|service| service.spec.name == name) {
            Some(service) => {
                service.current_status = status;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> ServiceSpec {
        ServiceSpec {
            name: name.to_string(),
            kind: ServiceKind::Website,
            address: "https://example.com".to_string(),
            port: None,
            maintenance: false,
            tooltip: None,
            webhook_url: None,
        }
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&Status::Online).unwrap(), "\"online\"");
        assert_eq!(serde_json::to_string(&Status::Offline).unwrap(), "\"offline\"");
        assert_eq!(
            serde_json::to_string(&Status::Maintenance).unwrap(),
            "\"maintenance\""
        );

        let status: Status = serde_json::from_str("\"online\"").unwrap();
        assert_eq!(status, Status::Online);
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&ServiceKind::GameServer).unwrap(),
            "\"game-server\""
        );
        assert_eq!(
            serde_json::to_string(&ServiceKind::HostReachability).unwrap(),
            "\"host-reachability\""
        );

        let kind: ServiceKind = serde_json::from_str("\"tcp\"").unwrap();
        assert_eq!(kind, ServiceKind::Tcp);
    }

    #[tokio::test]
    async fn test_registry_starts_unknown() {
        let registry = Registry::new(vec![spec("web")]);
        assert_eq!(registry.status_of("web").await, Some(Status::Unknown));
        assert_eq!(registry.status_of("missing").await, None);
    }

    #[tokio::test]
    async fn test_registry_set_status() {
        let registry = Registry::new(vec![spec("web")]);

        assert!(registry.set_status("web", Status::Online).await);
        assert_eq!(registry.status_of("web").await, Some(Status::Online));

        assert!(!registry.set_status("missing", Status::Online).await);
    }

    #[tokio::test]
    async fn test_registry_snapshot_is_a_copy() {
        let registry = Registry::new(vec![spec("web")]);
        let snapshot = registry.snapshot().await;

        registry.set_status("web", Status::Offline).await;

        assert_eq!(snapshot[0].current_status, Status::Unknown);
        assert_eq!(registry.status_of("web").await, Some(Status::Offline));
    }
}
