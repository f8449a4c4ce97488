//! HTTP layer: dashboard view, manual refresh, health

use crate::aggregate::{self, DayBucket, DEFAULT_WINDOW_DAYS};
use crate::config::StatusColors;
use crate::history::HistoryDocument;
use crate::monitor::UptimeMonitor;
use crate::service::{Service, Status};
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

// App state
pub struct AppState {
    pub monitor: Arc<UptimeMonitor>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    pub name: String,
    pub status: Status,
    pub history: Vec<DayBucket>,
    pub tooltip: Option<String>,
    pub uptime_percentage: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStatus {
    pub label: String,
    pub color: String,
    pub icon: String,
    pub class: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub page_name: String,
    pub overall: OverallStatus,
    pub services: Vec<ServiceView>,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_updated_relative: Option<String>,
}

/// Per-service views over consistent registry and store snapshots.
pub fn build_service_views(services: &[Service], document: &HistoryDocument) -> Vec<ServiceView> {
    services
        .iter()
        .map(|service| {
            let entries = document
                .service(&service.spec.name)
                .map(|record| record.history.as_slice())
                .unwrap_or(&[]);

            ServiceView {
                name: service.spec.name.clone(),
                status: service.current_status,
                history: aggregate::day_buckets(entries, DEFAULT_WINDOW_DAYS),
                tooltip: service.spec.tooltip.clone(),
                uptime_percentage: format!("{:.2}", aggregate::uptime_percentage(entries)),
            }
        })
        .collect()
}

/// Three-way rollup across all services: all online, all offline, or a
/// partial outage.
pub fn overall_status(services: &[Service], colors: &StatusColors) -> OverallStatus {
    let online = services
        .iter()
        .filter(|service| service.current_status == Status::Online)
        .count();

    if online == 0 {
        OverallStatus {
            label: "All services are offline".to_string(),
            color: colors.offline.clone(),
            icon: "fas fa-times-circle".to_string(),
            class: "offline".to_string(),
        }
    } else if online < services.len() {
        OverallStatus {
            label: "Partial services are offline".to_string(),
            color: colors.partial.clone(),
            icon: "fas fa-exclamation-circle".to_string(),
            class: "partial".to_string(),
        }
    } else {
        OverallStatus {
            label: "All services are online".to_string(),
            color: colors.online.clone(),
            icon: "fas fa-check-circle".to_string(),
            class: "online".to_string(),
        }
    }
}

// Aggregated dashboard payload
async fn dashboard(data: web::Data<AppState>) -> impl Responder {
    let monitor = &data.monitor;
    let services = monitor.registry().snapshot().await;
    let document = monitor.store().snapshot().await;
    let last_updated = monitor.store().last_updated().await;

    let view = DashboardView {
        page_name: monitor.config().page.name.clone(),
        overall: overall_status(&services, &monitor.config().status_colors),
        services: build_service_views(&services, &document),
        last_updated,
        last_updated_relative: last_updated.map(|t| aggregate::relative_time(t, Utc::now())),
    };

    HttpResponse::Ok().json(view)
}

// Run one poll sweep out-of-band and return the refreshed lastUpdated
async fn refresh(data: web::Data<AppState>) -> impl Responder {
    info!("Manual refresh requested");
    let last_updated = data.monitor.poll_sweep().await;

    HttpResponse::Ok().json(serde_json::json!({ "lastUpdated": last_updated }))
}

// Health check endpoint
async fn health() -> impl Responder {
    HttpResponse::Ok().json("OK")
}

/// Bind and run the dashboard server.
pub async fn run(
    monitor: Arc<UptimeMonitor>,
    bind_address: String,
    port: u16,
) -> std::io::Result<()> {
    let state = web::Data::new(AppState { monitor });
    info!("Dashboard listening on {}:{}", bind_address, port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/", web::get().to(dashboard))
            .route("/refresh", web::get().to(refresh))
            .route("/health", web::get().to(health))
    })
    .bind((bind_address, port))?
    .run()
    .await
}
