use anyhow::{anyhow, Context, Result};
use fd_lock::RwLock;
use std::fs::OpenOptions;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::KanbanEngineConfig;
use crate::definition::DirectoryDefinitionSource;
use crate::engine::WorkflowEngine;
use crate::process::InMemoryProcessStore;

/// On-disk state used by the CLI: a definitions directory and a JSON
/// snapshot of every process, guarded by an exclusive file lock.
pub struct Workspace {
    config: KanbanEngineConfig,
}

impl Workspace {
    pub fn new(config: KanbanEngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KanbanEngineConfig {
        &self.config
    }

    /// Lock the state file, load it, run `f`, then write the snapshot back.
    /// The snapshot is written even when `f` fails, since earlier commits stand.
    pub async fn run<F, Fut, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(WorkflowEngine) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let state_file = self.config.state_file();
        if let Some(parent) = state_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let lock_path = state_file.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("opening lock file {}", lock_path.display()))?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock
            .try_write()
            .map_err(|_| anyhow!("Another kanban-engine command holds {}. Try again shortly.", lock_path.display()))?;
        debug!(path = %lock_path.display(), "Workspace lock acquired");

        let store = Arc::new(InMemoryProcessStore::load_snapshot(&state_file).await?);
        let source = Arc::new(DirectoryDefinitionSource::new(self.config.definitions_dir()));
        let engine = WorkflowEngine::builder(source, store.clone())
            .config(self.config.clone())
            .build()?;

        let result = f(engine).await;
        let written = store
            .write_snapshot(&state_file)
            .await
            .with_context(|| format!("writing process snapshot {}", state_file.display()));

        match (result, written) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(write_error)) => {
                warn!(error = %write_error, "Process snapshot not written after failed command");
                Err(e.context(format!("{write_error:#}")))
            }
        }
    }
}
