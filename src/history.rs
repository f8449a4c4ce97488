//! Durable, append-only per-service status history

use crate::errors::Result;
use crate::service::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// One recorded status observation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub status: Status,
    pub timestamp: DateTime<Utc>,

    /// Outage length in seconds. Present only on an offline entry that was
    /// closed by the immediately following online transition; set exactly
    /// once, retroactively.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl HistoryEntry {
    pub fn new(status: Status, timestamp: DateTime<Utc>) -> Self {
        Self {
            status,
            timestamp,
            duration: None,
        }
    }
}

/// Append-only entry sequence for one service.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServiceHistory {
    pub name: String,
    pub history: Vec<HistoryEntry>,
}

/// Persisted shape of the history file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HistoryDocument {
    #[serde(default)]
    pub services: Vec<ServiceHistory>,
}

impl HistoryDocument {
    pub fn service(&self, name: &str) -> Option<&ServiceHistory> {
        self.services.iter().find(|service| service.name == name)
    }

    /// Service record, created empty on first use.
    pub fn service_mut(&mut self, name: &str) -> &mut ServiceHistory {
        if let Some(index) = self.services.iter().position(|service| service.name == name) {
            return &mut self.services[index];
        }

        self.services.push(ServiceHistory {
            name: name.to_string(),
            history: Vec::new(),
        });
        self.services.last_mut().unwrap()
    }

    pub fn last_entry(&self, name: &str) -> Option<&HistoryEntry> {
        self.service(name).and_then(|service| service.history.last())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LastUpdatedFile {
    #[serde(rename = "lastUpdated")]
    last_updated: Option<DateTime<Utc>>,
}

/// Durable history store.
///
/// All mutation goes through `apply`, which holds the write lock across the
/// whole read-modify-write and rewrites the entire document, so a duration
/// backfill can never interleave with a concurrent append. Readers take
/// cloned snapshots.
pub struct HistoryStore {
    document: RwLock<HistoryDocument>,
    last_updated: RwLock<Option<DateTime<Utc>>>,
    history_path: PathBuf,
    last_updated_path: PathBuf,
}

impl HistoryStore {
    /// Load the store from disk. A missing or empty file yields an empty
    /// store; only unreadable or corrupt content is an error.
    pub async fn load(history_path: &Path, last_updated_path: &Path) -> Result<Self> {
        let document = match read_if_present(history_path).await? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => HistoryDocument::default(),
        };

        let last_updated = match read_if_present(last_updated_path).await? {
            Some(raw) => serde_json::from_str::<LastUpdatedFile>(&raw)?.last_updated,
            None => None,
        };

        debug!(
            "Loaded history for {} services from {}",
            document.services.len(),
            history_path.display()
        );

        Ok(Self {
            document: RwLock::new(document),
            last_updated: RwLock::new(last_updated),
            history_path: history_path.to_path_buf(),
            last_updated_path: last_updated_path.to_path_buf(),
        })
    }

    /// Run a mutation under the write lock, then rewrite the whole document
    /// atomically. A failed rewrite is logged and tolerated: the in-memory
    /// document has already advanced, at the cost of losing the write on
    /// restart.
    pub async fn apply<T>(&self, mutate: impl FnOnce(&mut HistoryDocument) -> T) -> T {
        let mut document = self.document.write().await;
        let result = mutate(&mut document);

        match serde_json::to_string_pretty(&*document) {
            Ok(raw) => {
                if let Err(e) = write_atomic(&self.history_path, &raw).await {
                    warn!(
                        "Failed to persist history to {}: {}",
                        self.history_path.display(),
                        e
                    );
                }
            }
            Err(e) => warn!("Failed to serialize history document: {}", e),
        }

        result
    }

    /// Persist the global lastUpdated instant. Write failures are logged and
    /// tolerated like any other persistence failure.
    pub async fn set_last_updated(&self, timestamp: DateTime<Utc>) {
        let mut last_updated = self.last_updated.write().await;
        *last_updated = Some(timestamp);

        let file = LastUpdatedFile {
            last_updated: Some(timestamp),
        };
        match serde_json::to_string_pretty(&file) {
            Ok(raw) => {
                if let Err(e) = write_atomic(&self.last_updated_path, &raw).await {
                    warn!(
                        "Failed to persist lastUpdated to {}: {}",
                        self.last_updated_path.display(),
                        e
                    );
                }
            }
            Err(e) => warn!("Failed to serialize lastUpdated: {}", e),
        }
    }

    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        *self.last_updated.read().await
    }

    /// Consistent copy of the whole document for the render path.
    pub async fn snapshot(&self) -> HistoryDocument {
        self.document.read().await.clone()
    }
}

async fn read_if_present(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write via a temp file plus rename so a crash mid-write never leaves a
/// truncated document behind.
async fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    async fn store_in(dir: &Path) -> HistoryStore {
        HistoryStore::load(&dir.join("history.json"), &dir.join("lastUpdated.json"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_missing_files_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;

        assert!(store.snapshot().await.services.is_empty());
        assert!(store.last_updated().await.is_none());
    }

    #[tokio::test]
    async fn test_load_empty_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("history.json"), "")
            .await
            .unwrap();

        let store = store_in(dir.path()).await;
        assert!(store.snapshot().await.services.is_empty());
    }

    #[tokio::test]
    async fn test_apply_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = store_in(dir.path()).await;
            store
                .apply(|document| {
                    document
                        .service_mut("web")
                        .history
                        .push(HistoryEntry::new(Status::Online, ts(1000)));
                })
                .await;
            store.set_last_updated(ts(1000)).await;
        }

        let reloaded = store_in(dir.path()).await;
        let document = reloaded.snapshot().await;
        assert_eq!(document.services.len(), 1);
        assert_eq!(document.last_entry("web").unwrap().status, Status::Online);
        assert_eq!(reloaded.last_updated().await, Some(ts(1000)));
    }

    #[tokio::test]
    async fn test_duration_omitted_when_absent() {
        let entry = HistoryEntry::new(Status::Offline, ts(0));
        let raw = serde_json::to_string(&entry).unwrap();
        assert!(!raw.contains("duration"));

        let mut closed = entry.clone();
        closed.duration = Some(12.5);
        let raw = serde_json::to_string(&closed).unwrap();
        assert!(raw.contains("\"duration\":12.5"));
    }

    #[tokio::test]
    async fn test_service_record_created_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;

        store
            .apply(|document| {
                assert!(document.service("web").is_none());
                document.service_mut("web");
            })
            .await;

        assert!(store.snapshot().await.service("web").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mutations_never_tear() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(dir.path()).await);

        store
            .apply(|document| {
                document
                    .service_mut("web")
                    .history
                    .push(HistoryEntry::new(Status::Offline, ts(0)));
            })
            .await;

        // One task backfills the trailing offline entry and appends the
        // online transition; the other races heartbeat-style appends. The
        // injected sleeps widen any window between read and write.
        let backfill = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .apply(|document| {
                        let service = document.service_mut("web");
                        let last = service.history.last().cloned().unwrap();
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        if last.status == Status::Offline {
                            service.history.last_mut().unwrap().duration = Some(60.0);
                        }
                        service.history.push(HistoryEntry::new(Status::Online, ts(60)));
                    })
                    .await;
            })
        };

        let appends = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for i in 0..5 {
                    store
                        .apply(|document| {
                            let service = document.service_mut("web");
                            let last = service.history.last().cloned().unwrap();
                            std::thread::sleep(std::time::Duration::from_millis(5));
                            if last.status != Status::Offline {
                                service
                                    .history
                                    .push(HistoryEntry::new(last.status, ts(100 + i)));
                            }
                        })
                        .await;
                }
            })
        };

        backfill.await.unwrap();
        appends.await.unwrap();

        let document = store.snapshot().await;
        let history = &document.service("web").unwrap().history;

        // The backfill landed on the offline entry exactly once, and every
        // duration-bearing entry is an offline entry followed by an online
        // one.
        for (index, entry) in history.iter().enumerate() {
            if entry.duration.is_some() {
                assert_eq!(entry.status, Status::Offline);
                assert_eq!(history[index + 1].status, Status::Online);
            }
        }
        assert_eq!(
            history.iter().filter(|entry| entry.duration.is_some()).count(),
            1
        );
    }
}
