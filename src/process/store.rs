use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use super::types::ProcessInstance;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Process not found: {0}")]
    NotFound(String),

    #[error("Process already exists: {0}")]
    AlreadyExists(String),

    #[error("Version mismatch for process {process_id}: expected {expected}, found {found}")]
    VersionConflict {
        process_id: String,
        expected: u64,
        found: u64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Selection criteria for `ProcessStore::find`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessFilter {
    pub kanban_id: Option<String>,
    pub current_state: Option<String>,
}

impl ProcessFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn kanban(kanban_id: impl Into<String>) -> Self {
        Self {
            kanban_id: Some(kanban_id.into()),
            current_state: None,
        }
    }

    pub fn in_state(mut self, state: impl Into<String>) -> Self {
        self.current_state = Some(state.into());
        self
    }

    pub fn matches(&self, process: &ProcessInstance) -> bool {
        self.kanban_id
            .as_deref()
            .map_or(true, |k| process.kanban_id == k)
            && self
                .current_state
                .as_deref()
                .map_or(true, |s| process.current_state == s)
    }
}

/// Persistence contract the engine relies on
#[async_trait]
pub trait ProcessStore: Send + Sync {
    async fn get(&self, process_id: &str) -> Result<Option<ProcessInstance>, StoreError>;

    /// Store a newly created process
    async fn insert(&self, process: ProcessInstance) -> Result<(), StoreError>;

    /// Replace a process if its stored version equals `expected_version`.
    /// Returns the new version. Never overwrites on mismatch.
    async fn save(&self, process: &ProcessInstance, expected_version: u64) -> Result<u64, StoreError>;

    async fn find(&self, filter: &ProcessFilter) -> Result<Vec<ProcessInstance>, StoreError>;
}

/// Reference store kept in memory
#[derive(Debug, Default)]
pub struct InMemoryProcessStore {
    processes: RwLock<HashMap<String, ProcessInstance>>,
}

impl InMemoryProcessStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.processes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.processes.read().await.is_empty()
    }

    /// Load a JSON snapshot (array of processes). A missing file yields an empty store.
    pub async fn load_snapshot(path: &Path) -> Result<Self, StoreError> {
        if !fs::try_exists(path).await? {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path).await?;
        let processes: Vec<ProcessInstance> = if content.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&content)?
        };
        debug!(path = %path.display(), count = processes.len(), "Loaded process snapshot");
        let map = processes
            .into_iter()
            .map(|p| (p.process_id.clone(), p))
            .collect();
        Ok(Self {
            processes: RwLock::new(map),
        })
    }

    /// Write all processes as a JSON snapshot via a temp file and rename
    pub async fn write_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let mut processes: Vec<ProcessInstance> =
            self.processes.read().await.values().cloned().collect();
        processes.sort_by(|a, b| a.process_id.cmp(&b.process_id));

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&processes)?).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl ProcessStore for InMemoryProcessStore {
    async fn get(&self, process_id: &str) -> Result<Option<ProcessInstance>, StoreError> {
        Ok(self.processes.read().await.get(process_id).cloned())
    }

    async fn insert(&self, process: ProcessInstance) -> Result<(), StoreError> {
        let mut processes = self.processes.write().await;
        if processes.contains_key(&process.process_id) {
            return Err(StoreError::AlreadyExists(process.process_id));
        }
        processes.insert(process.process_id.clone(), process);
        Ok(())
    }

    async fn save(&self, process: &ProcessInstance, expected_version: u64) -> Result<u64, StoreError> {
        let mut processes = self.processes.write().await;
        let stored = processes
            .get_mut(&process.process_id)
            .ok_or_else(|| StoreError::NotFound(process.process_id.clone()))?;

        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                process_id: process.process_id.clone(),
                expected: expected_version,
                found: stored.version,
            });
        }

        let mut updated = process.clone();
        updated.version = expected_version + 1;
        *stored = updated;
        Ok(expected_version + 1)
    }

    async fn find(&self, filter: &ProcessFilter) -> Result<Vec<ProcessInstance>, StoreError> {
        let mut found: Vec<ProcessInstance> = self
            .processes
            .read()
            .await
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.process_id.cmp(&b.process_id));
        Ok(found)
    }
}
