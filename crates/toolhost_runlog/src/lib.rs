//! Append-only log of sandboxed script runs. Writes are best-effort
//! and off the request path; reads support "last N", "since T" and
//! "by session" queries.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use toolhost_ids::{RunId, SessionId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptRunRecord {
    pub id: RunId,
    pub started_at: DateTime<Utc>,
    pub script: String,
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Error)]
pub enum RunLogError {
    #[error("failed to open run log at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write run record: {0}")]
    Write(#[from] std::io::Error),
}

/// A single JSONL file, append-only. Retention is by age (`retention_days`
/// in the server config) rather than size, trimmed on a schedule external
/// to this type.
pub struct RunLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Best-effort append; failures are logged, never propagated to the
    /// caller. A script's result must not depend on whether its history
    /// entry could be persisted.
    pub async fn append(&self, record: &ScriptRunRecord) {
        if let Err(e) = self.append_inner(record).await {
            tracing::warn!(error = %e, "failed to append run log record");
        }
    }

    async fn append_inner(&self, record: &ScriptRunRecord) -> Result<(), RunLogError> {
        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|source| RunLogError::Open {
                path: self.path.clone(),
                source,
            })?;
        let mut line = serde_json::to_vec(record).unwrap_or_default();
        line.push(b'\n');
        file.write_all(&line).await?;
        Ok(())
    }

    pub async fn last_n(&self, n: usize) -> Vec<ScriptRunRecord> {
        let all = self.read_all().await;
        let start = all.len().saturating_sub(n);
        all[start..].to_vec()
    }

    pub async fn since(&self, since: DateTime<Utc>) -> Vec<ScriptRunRecord> {
        self.read_all()
            .await
            .into_iter()
            .filter(|r| r.started_at >= since)
            .collect()
    }

    pub async fn by_session(&self, session: SessionId) -> Vec<ScriptRunRecord> {
        self.read_all()
            .await
            .into_iter()
            .filter(|r| r.session_id == Some(session))
            .collect()
    }

    /// Drops every record older than `cutoff` by rewriting the file.
    /// Best-effort like `append`; run on a schedule (server startup, then
    /// daily), never on the request path.
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) {
        let _guard = self.write_lock.lock().await;
        let kept: Vec<ScriptRunRecord> = self
            .read_all_unlocked()
            .await
            .into_iter()
            .filter(|r| r.started_at >= cutoff)
            .collect();

        let mut buf = Vec::new();
        for record in &kept {
            if let Ok(mut line) = serde_json::to_vec(record) {
                line.push(b'\n');
                buf.extend_from_slice(&line);
            }
        }
        if let Err(e) = tokio::fs::write(&self.path, buf).await {
            tracing::warn!(error = %e, "failed to prune run log");
        }
    }

    async fn read_all(&self) -> Vec<ScriptRunRecord> {
        let _guard = self.write_lock.lock().await;
        self.read_all_unlocked().await
    }

    async fn read_all_unlocked(&self) -> Vec<ScriptRunRecord> {
        let Ok(file) = tokio::fs::File::open(&self.path).await else {
            return Vec::new();
        };
        let mut lines = BufReader::new(file).lines();
        let mut out = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ScriptRunRecord>(&line) {
                Ok(record) => out.push(record),
                Err(e) => tracing::warn!(error = %e, "skipping malformed run log line"),
            }
        }
        out
    }
}

pub fn default_run_log_path(home: &Path) -> PathBuf {
    home.join("run_log.jsonl")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(script: &str, session: Option<SessionId>) -> ScriptRunRecord {
        ScriptRunRecord {
            id: RunId::new(),
            started_at: Utc::now(),
            script: script.to_string(),
            success: true,
            output: "ok".into(),
            error: None,
            duration_ms: 5,
            session_id: session,
        }
    }

    #[tokio::test]
    async fn appends_and_reads_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::new(dir.path().join("log.jsonl"));
        log.append(&record("a", None)).await;
        log.append(&record("b", None)).await;
        log.append(&record("c", None)).await;

        let last_two = log.last_n(2).await;
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].script, "b");
        assert_eq!(last_two[1].script, "c");
    }

    #[tokio::test]
    async fn filters_by_session() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::new(dir.path().join("log.jsonl"));
        let session = SessionId::new();
        log.append(&record("a", Some(session))).await;
        log.append(&record("b", None)).await;

        let filtered = log.by_session(session).await;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].script, "a");
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::new(dir.path().join("nonexistent.jsonl"));
        assert!(log.last_n(10).await.is_empty());
    }

    #[tokio::test]
    async fn prune_drops_only_records_older_than_the_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::new(dir.path().join("log.jsonl"));
        let mut old = record("old", None);
        old.started_at = Utc::now() - chrono::Duration::days(60);
        log.append(&old).await;
        log.append(&record("fresh", None)).await;

        log.prune_older_than(Utc::now() - chrono::Duration::days(30)).await;

        let remaining = log.last_n(10).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].script, "fresh");
    }
}
