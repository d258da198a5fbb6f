use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::loader::DefinitionSource;
use super::types::WorkflowDefinition;
use super::validation::validate;
use super::DefinitionError;

/// Cached, immutable definition snapshots.
///
/// Callers receive an `Arc` and keep it for the whole operation. `reload` builds
/// and validates the new definition before swapping it in, so a reader sees either
/// the old snapshot or the new one, never a mix.
pub struct DefinitionRegistry {
    source: Arc<dyn DefinitionSource>,
    cache: Cache<String, Arc<WorkflowDefinition>>,
}

impl std::fmt::Debug for DefinitionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionRegistry")
            .field("cached", &self.cache.entry_count())
            .finish()
    }
}

impl DefinitionRegistry {
    pub fn new(source: Arc<dyn DefinitionSource>) -> Self {
        let cache = Cache::builder().max_capacity(1000).build();
        Self { source, cache }
    }

    /// Expire snapshots after `ttl` so edits on the source are eventually picked up
    pub fn with_ttl(source: Arc<dyn DefinitionSource>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();
        Self { source, cache }
    }

    /// Current snapshot, loading it on first use
    pub async fn get(&self, kanban_id: &str) -> Result<Arc<WorkflowDefinition>, DefinitionError> {
        if let Some(def) = self.cache.get(kanban_id).await {
            return Ok(def);
        }

        debug!(kanban_id, "Definition cache miss");
        let def = self.load_validated(kanban_id).await?;
        self.cache.insert(kanban_id.to_string(), def.clone()).await;
        Ok(def)
    }

    /// Load a fresh snapshot from the source and swap it in.
    /// On failure the previous snapshot stays in place.
    pub async fn reload(&self, kanban_id: &str) -> Result<Arc<WorkflowDefinition>, DefinitionError> {
        match self.load_validated(kanban_id).await {
            Ok(def) => {
                self.cache.insert(kanban_id.to_string(), def.clone()).await;
                info!(kanban_id, version = def.version, "Workflow definition reloaded");
                Ok(def)
            }
            Err(e) => {
                warn!(kanban_id, error = %e, "Definition reload failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    pub async fn invalidate(&self, kanban_id: &str) {
        self.cache.invalidate(kanban_id).await;
    }

    async fn load_validated(&self, kanban_id: &str) -> Result<Arc<WorkflowDefinition>, DefinitionError> {
        let def = self.source.load(kanban_id).await?.normalized();
        let issues = validate(&def);
        if !issues.is_empty() {
            return Err(DefinitionError::Invalid {
                kanban_id: kanban_id.to_string(),
                issues,
            });
        }
        Ok(Arc::new(def))
    }
}
