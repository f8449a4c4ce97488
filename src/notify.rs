//! Transition events and webhook notification delivery

use crate::errors::{MonitorError, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Kind of a transition event as exposed to the notifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Online,
    Offline,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Online => write!(f, "online"),
            EventKind::Offline => write!(f, "offline"),
        }
    }
}

/// A fully resolved transition event, ready for dispatch.
#[derive(Clone, Debug, Serialize)]
pub struct TransitionEvent {
    pub event_id: String,
    pub service_name: String,
    pub kind: EventKind,
    pub title: String,
    pub description: String,
    pub color: String,
    pub webhook_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// One notification template with `{{placeholder}}` substitution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub title: String,
    pub description: String,
}

impl MessageTemplate {
    /// Resolve the template placeholders. Timestamps render as epoch
    /// seconds; missing values render as "N/A".
    pub fn render(
        &self,
        service_name: &str,
        last_offline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        formatted_duration: Option<&str>,
    ) -> (String, String) {
        let last_offline = last_offline
            .map(|t| t.timestamp().to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let current = now.timestamp().to_string();
        let duration = formatted_duration.unwrap_or("N/A");

        let substitute = |template: &str| {
            template
                .replace("{{serviceName}}", service_name)
                .replace("{{lastOfflineTimestamp}}", &last_offline)
                .replace("{{currentTimestamp}}", &current)
                .replace("{{formattedDuration}}", duration)
        };

        (substitute(&self.title), substitute(&self.description))
    }
}

/// Online and offline notification templates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageTemplates {
    pub online: MessageTemplate,
    pub offline: MessageTemplate,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            online: MessageTemplate {
                title: "{{serviceName}} is back online".to_string(),
                description:
                    "{{serviceName}} recovered at <t:{{currentTimestamp}}> after {{formattedDuration}} of downtime."
                        .to_string(),
            },
            offline: MessageTemplate {
                title: "{{serviceName}} is offline".to_string(),
                description: "{{serviceName}} went offline at <t:{{currentTimestamp}}>.".to_string(),
            },
        }
    }
}

/// Convert a "#rrggbb" token to the integer form webhook embeds expect.
fn color_to_int(color: &str) -> u32 {
    u32::from_str_radix(color.trim_start_matches('#'), 16).unwrap_or(0)
}

/// Fire-and-forget webhook delivery of transition events.
pub struct WebhookNotifier {
    client: Client,
    username: String,
    avatar_url: String,
}

impl WebhookNotifier {
    pub fn new(username: String, avatar_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .user_agent(format!("uptime-monitor/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(MonitorError::Http)?;

        Ok(Self {
            client,
            username,
            avatar_url,
        })
    }

    /// Deliver one event to its service's webhook. Failures are logged and
    /// never retried or propagated; services without a webhook are skipped.
    // TODO: bounded retry with backoff for transient delivery failures
    pub async fn dispatch(&self, event: &TransitionEvent) {
        let Some(url) = &event.webhook_url else {
            debug!(
                "No webhook configured for {}, skipping event {}",
                event.service_name, event.event_id
            );
            return;
        };

        let payload = json!({
            "username": self.username,
            "avatar_url": self.avatar_url,
            "embeds": [{
                "title": event.title,
                "description": event.description,
                "color": color_to_int(&event.color),
                "timestamp": event.timestamp.to_rfc3339(),
            }],
        });

        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(
                    "Delivered {} event {} for {}",
                    event.kind, event.event_id, event.service_name
                );
            }
            Ok(response) => {
                warn!(
                    "Webhook for {} rejected event {}: {}",
                    event.service_name,
                    event.event_id,
                    response.status()
                );
            }
            Err(e) => {
                warn!(
                    "Failed to deliver webhook for {}: {}",
                    event.service_name, e
                );
            }
        }
    }
}
