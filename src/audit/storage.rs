use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::query::AuditEntry;
use crate::process::{ProcessInstance, TransitionRecord};

/// Secondary destination for committed transition records.
/// Process histories stay authoritative; a sink failure is logged, not raised.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, process: &ProcessInstance, record: &TransitionRecord) -> anyhow::Result<()>;
}

/// Append-only JSON Lines mirror of the audit trail
#[derive(Debug)]
pub struct JsonlAuditSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry back; unparsable lines are skipped with a warning
    pub async fn load_entries(&self) -> anyhow::Result<Vec<AuditEntry>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("Failed to parse audit line: {}", e),
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn record(&self, process: &ProcessInstance, record: &TransitionRecord) -> anyhow::Result<()> {
        let entry = AuditEntry {
            process_id: process.process_id.clone(),
            kanban_id: process.kanban_id.clone(),
            sequence: process.history.len().saturating_sub(1),
            record: record.clone(),
        };
        let content = format!("{}\n", serde_json::to_string(&entry)?);

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ActorType;
    use chrono::Utc;
    use serde_json::Map;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_and_load() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlAuditSink::new(dir.path().join("audit/trail.jsonl"));
        assert!(sink.load_entries().await.unwrap().is_empty());

        let mut process = ProcessInstance::new("p1", "vendas", "b", Map::new());
        for (from, to) in [("a", "b"), ("b", "a")] {
            let record = TransitionRecord {
                timestamp: Utc::now(),
                from_state: from.into(),
                to_state: to.into(),
                actor: "ana".into(),
                actor_type: ActorType::User,
                trigger: "manual".into(),
                forced: to == "a",
                justification: None,
                prerequisites_checked: BTreeMap::new(),
            };
            process.history.push(record.clone());
            sink.record(&process, &record).await.unwrap();
        }

        let entries = sink.load_entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].sequence, 1);
        assert!(entries[1].record.forced);
    }
}
