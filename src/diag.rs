//! Append-only diagnostic log for probe and internal failures

use chrono::Utc;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Appends timestamped error blocks to a plain-text log file. Write failures
/// are swallowed: the diagnostic sink must never take down its caller.
#[derive(Clone, Debug)]
pub struct DiagLog {
    path: PathBuf,
}

impl DiagLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn record(&self, context: &str, detail: &str) {
        let block = format!(
            "\n\n[{}] [ERROR] {}\n{}",
            Utc::now().to_rfc3339(),
            context,
            detail
        );

        if let Err(e) = self.append(&block).await {
            debug!("Diagnostic log write to {} failed: {}", self.path.display(), e);
        }
    }

    async fn append(&self, block: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(block.as_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_appends_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.txt");
        let diag = DiagLog::new(path.clone());

        diag.record("probe failed for web", "connection refused").await;
        diag.record("probe failed for db", "timed out").await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("[ERROR] probe failed for web"));
        assert!(contents.contains("connection refused"));
        assert!(contents.contains("timed out"));
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        // The path is a directory, so every append fails; record must not
        // panic or propagate.
        let dir = tempfile::tempdir().unwrap();
        let diag = DiagLog::new(dir.path().to_path_buf());

        diag.record("context", "detail").await;
    }
}
