//! Poll scheduling and sweep orchestration

use crate::config::Config;
use crate::diag::DiagLog;
use crate::errors::{MonitorError, Result};
use crate::history::HistoryStore;
use crate::notify::WebhookNotifier;
use crate::probes::{PingProbe, ProbeAdapter, StatusClassifier};
use crate::service::{Registry, ServiceKind, ServiceSpec};
use crate::transition::TransitionEngine;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Fixed cadence of the heartbeat snapshot, independent of the poll interval.
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(6 * 60);

/// Orchestrates the poll and snapshot timers over the shared registry,
/// classifier, transition engine and history store.
pub struct UptimeMonitor {
    config: Config,
    registry: Arc<Registry>,
    store: Arc<HistoryStore>,
    classifier: Arc<StatusClassifier>,
    engine: Arc<TransitionEngine>,
    notifier: Arc<WebhookNotifier>,
    sweep_lock: Arc<Mutex<()>>,
}

impl UptimeMonitor {
    pub async fn new(config: Config) -> Result<Self> {
        config.validate().map_err(MonitorError::Config)?;

        let diag = DiagLog::new(config.diag_log_path.clone());
        let registry = Arc::new(Registry::new(config.services.clone()));
        let store = Arc::new(
            HistoryStore::load(&config.history_path, &config.last_updated_path).await?,
        );
        let classifier = Arc::new(StatusClassifier::new(&config, diag)?);
        let engine = Arc::new(TransitionEngine::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            config.webhook_messages.clone(),
            config.status_colors.clone(),
        ));
        let notifier = Arc::new(WebhookNotifier::new(
            config.page.name.clone(),
            config.page.logo.clone(),
        )?);

        Ok(Self {
            config,
            registry,
            store,
            classifier,
            engine,
            notifier,
            sweep_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Create a clone suitable for async tasks. The locks and stores are
    /// shared, so a clone's sweep still serializes against the original's.
    fn clone_for_task(&self) -> Self {
        Self {
            config: self.config.clone(),
            registry: Arc::clone(&self.registry),
            store: Arc::clone(&self.store),
            classifier: Arc::clone(&self.classifier),
            engine: Arc::clone(&self.engine),
            notifier: Arc::clone(&self.notifier),
            sweep_lock: Arc::clone(&self.sweep_lock),
        }
    }

    /// Swap in a different classifier (probe injection for tests).
    pub fn with_classifier(mut self, classifier: StatusClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Run the startup self-check and spawn the poll and snapshot timers.
    /// Both loops survive any tick failure; a bad sweep is logged at its
    /// site and the next tick simply fires.
    pub async fn start(&self) -> Result<()> {
        self.connectivity_check().await;

        let poll_interval = self.config.update_interval()?;
        info!(
            "Monitoring {} services every {:?}, snapshots every {:?}",
            self.config.services.len(),
            poll_interval,
            SNAPSHOT_INTERVAL
        );

        let monitor = self.clone_for_task();
        tokio::spawn(async move {
            // The first tick fires immediately, giving the startup sweep.
            let mut ticker = interval(poll_interval);
            loop {
                ticker.tick().await;
                let last_updated = monitor.poll_sweep().await;
                debug!("Poll sweep complete at {}", last_updated);
            }
        });

        let monitor = self.clone_for_task();
        tokio::spawn(async move {
            let mut ticker = interval(SNAPSHOT_INTERVAL);
            ticker.tick().await; // skip the immediate first tick
            loop {
                ticker.tick().await;
                monitor.engine.heartbeat(Utc::now()).await;
            }
        });

        Ok(())
    }

    /// One full poll sweep, shared by the timer and the manual refresh
    /// trigger. Classification fans out concurrently (read-only); the
    /// results fan in and apply sequentially under the sweep lock, so a
    /// manual refresh racing the timer cannot double-count.
    pub async fn poll_sweep(&self) -> DateTime<Utc> {
        let _guard = self.sweep_lock.lock().await;

        let specs = self.registry.specs().await;
        let checks = specs.iter().map(|spec| self.classifier.classify(spec));
        let results = join_all(checks).await;

        for (spec, new_status) in specs.iter().zip(results) {
            if let Some(event) = self.engine.apply(&spec.name, new_status, Utc::now()).await {
                info!(
                    "Service {} is now {}, dispatching event {}",
                    event.service_name, event.kind, event.event_id
                );
                let notifier = Arc::clone(&self.notifier);
                tokio::spawn(async move {
                    notifier.dispatch(&event).await;
                });
            }
        }

        // lastUpdated advances on every sweep, transitions or not.
        let now = Utc::now();
        self.store.set_last_updated(now).await;
        now
    }

    /// One ICMP echo against a well-known host. Some environments cannot
    /// ping at all, so a failure only warns.
    async fn connectivity_check(&self) {
        let probe = PingProbe::new(self.config.probe_timeout_secs);
        let target = ServiceSpec {
            name: "connectivity-check".to_string(),
            kind: ServiceKind::HostReachability,
            address: "8.8.8.8".to_string(),
            port: None,
            maintenance: false,
            tooltip: None,
            webhook_url: None,
        };

        match probe.probe(&target).await {
            Ok(()) => debug!("Connectivity self-check succeeded"),
            Err(e) => warn!(
                "Connectivity self-check failed, host-reachability probes may not work here: {}",
                e
            ),
        }
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn store(&self) -> Arc<HistoryStore> {
        Arc::clone(&self.store)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
