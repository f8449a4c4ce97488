//! Uptime Monitor Library
//!
//! This library polls heterogeneous network services, tracks status
//! transitions with a durable per-service history, and aggregates that
//! history into the day-bucketed views the dashboard serves.

pub mod config;
pub mod service;
pub mod history;
pub mod probes;
pub mod transition;
pub mod aggregate;
pub mod notify;
pub mod monitor;
pub mod server;
pub mod diag;
pub mod errors;

pub use config::Config;
pub use history::{HistoryEntry, HistoryStore, ServiceHistory};
pub use monitor::UptimeMonitor;
pub use service::{Registry, Service, ServiceKind, ServiceSpec, Status};
pub use errors::{MonitorError, Result};
