//! Status transition application and heartbeat snapshots

use crate::aggregate::format_duration;
use crate::config::StatusColors;
use crate::history::{HistoryEntry, HistoryStore};
use crate::notify::{EventKind, MessageTemplates, TransitionEvent};
use crate::service::{Registry, Status};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Applies classified poll results to the registry and the durable history.
///
/// Single-writer discipline: the store's `apply` holds its write lock across
/// the whole read-modify-write, and the monitor serializes poll sweeps, so a
/// duration backfill can never interleave with a heartbeat append.
pub struct TransitionEngine {
    registry: Arc<Registry>,
    store: Arc<HistoryStore>,
    templates: MessageTemplates,
    colors: StatusColors,
}

impl TransitionEngine {
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<HistoryStore>,
        templates: MessageTemplates,
        colors: StatusColors,
    ) -> Self {
        Self {
            registry,
            store,
            templates,
            colors,
        }
    }

    /// Apply one poll result for one service. Returns the transition event
    /// to dispatch, when the change warrants one: there must have been a
    /// prior history entry whose status differs from the new one, so the
    /// very first observation of a service never notifies.
    pub async fn apply(
        &self,
        name: &str,
        new_status: Status,
        now: DateTime<Utc>,
    ) -> Option<TransitionEvent> {
        let current = self.registry.status_of(name).await?;
        if current == new_status {
            // Idempotent on repeated identical results.
            return None;
        }

        self.registry.set_status(name, new_status).await;

        let (prior, closed_duration) = self
            .store
            .apply(|document| {
                let service = document.service_mut(name);
                let prior = service.history.last().cloned();

                let mut closed_duration = None;
                if let Some(last) = service.history.last_mut() {
                    if last.status == Status::Offline && new_status == Status::Online {
                        let seconds = (now - last.timestamp).num_milliseconds() as f64 / 1000.0;
                        last.duration = Some(seconds);
                        closed_duration = Some(seconds);
                    }
                }

                service.history.push(HistoryEntry::new(new_status, now));
                (prior, closed_duration)
            })
            .await;
        self.store.set_last_updated(now).await;

        debug!("Service {} transitioned {} -> {}", name, current, new_status);

        let prior = prior?;
        if prior.status == new_status {
            return None;
        }

        Some(
            self.build_event(name, new_status, &prior, closed_duration, now)
                .await,
        )
    }

    /// Periodic snapshot append: stamps the current status for every service
    /// whose latest entry is not offline, keeping the record dense during
    /// uptime without inflating it during outages. Never mutates
    /// `current_status`, never produces events, never writes `unknown`.
    pub async fn heartbeat(&self, now: DateTime<Utc>) {
        let services = self.registry.snapshot().await;

        let appended = self
            .store
            .apply(|document| {
                let mut appended = 0usize;
                for service in &services {
                    if service.current_status == Status::Unknown {
                        continue;
                    }

                    let Some(record) = document.service(&service.spec.name) else {
                        continue;
                    };
                    let Some(last) = record.history.last() else {
                        continue;
                    };
                    if last.status == Status::Offline {
                        continue;
                    }

                    document
                        .service_mut(&service.spec.name)
                        .history
                        .push(HistoryEntry::new(service.current_status, now));
                    appended += 1;
                }
                appended
            })
            .await;

        if appended > 0 {
            debug!("Heartbeat snapshot appended {} entries", appended);
        }
    }

    async fn build_event(
        &self,
        name: &str,
        new_status: Status,
        prior: &HistoryEntry,
        closed_duration: Option<f64>,
        now: DateTime<Utc>,
    ) -> TransitionEvent {
        let (kind, template, color) = if new_status == Status::Online {
            (EventKind::Online, &self.templates.online, &self.colors.online)
        } else {
            (
                EventKind::Offline,
                &self.templates.offline,
                &self.colors.offline,
            )
        };

        let last_offline = (prior.status == Status::Offline).then_some(prior.timestamp);
        let formatted = closed_duration.map(format_duration);
        let (title, description) = template.render(name, last_offline, now, formatted.as_deref());

        TransitionEvent {
            event_id: Uuid::new_v4().to_string(),
            service_name: name.to_string(),
            kind,
            title,
            description,
            color: color.clone(),
            webhook_url: self
                .registry
                .spec_of(name)
                .await
                .and_then(|spec| spec.webhook_url),
            timestamp: now,
        }
    }
}
