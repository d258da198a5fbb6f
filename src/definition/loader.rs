use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use super::types::WorkflowDefinition;
use super::DefinitionError;

/// Where workflow definitions come from
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    async fn load(&self, kanban_id: &str) -> Result<WorkflowDefinition, DefinitionError>;
}

/// Parse a definition from JSON text
pub fn from_json_str(content: &str) -> Result<WorkflowDefinition, DefinitionError> {
    let def: WorkflowDefinition = serde_json::from_str(content)?;
    Ok(def.normalized())
}

/// Parse a definition from TOML text
pub fn from_toml_str(content: &str) -> Result<WorkflowDefinition, DefinitionError> {
    let def: WorkflowDefinition = toml::from_str(content)?;
    Ok(def.normalized())
}

/// Load a single definition file, picking the format from its extension
pub async fn load_from_file(path: &Path) -> Result<WorkflowDefinition, DefinitionError> {
    let content = fs::read_to_string(path).await?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => from_toml_str(&content),
        _ => from_json_str(&content),
    }
}

/// Definitions held in memory, mainly for tests and embedding
#[derive(Debug, Default)]
pub struct InMemoryDefinitionSource {
    definitions: RwLock<HashMap<String, WorkflowDefinition>>,
}

impl InMemoryDefinitionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_definitions(definitions: impl IntoIterator<Item = WorkflowDefinition>) -> Self {
        let map = definitions
            .into_iter()
            .map(|d| {
                let d = d.normalized();
                (d.kanban_id.clone(), d)
            })
            .collect();
        Self {
            definitions: RwLock::new(map),
        }
    }

    /// Replace the stored definition; visible to the registry after `reload`
    pub async fn put(&self, definition: WorkflowDefinition) {
        let definition = definition.normalized();
        self.definitions
            .write()
            .await
            .insert(definition.kanban_id.clone(), definition);
    }
}

#[async_trait]
impl DefinitionSource for InMemoryDefinitionSource {
    async fn load(&self, kanban_id: &str) -> Result<WorkflowDefinition, DefinitionError> {
        self.definitions
            .read()
            .await
            .get(kanban_id)
            .cloned()
            .ok_or_else(|| DefinitionError::NotFound(kanban_id.to_string()))
    }
}

/// Reads `<dir>/<kanban_id>.json` or `<dir>/<kanban_id>.toml`
#[derive(Debug, Clone)]
pub struct DirectoryDefinitionSource {
    directory: PathBuf,
}

impl DirectoryDefinitionSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn candidates(&self, kanban_id: &str) -> [PathBuf; 2] {
        [
            self.directory.join(format!("{kanban_id}.json")),
            self.directory.join(format!("{kanban_id}.toml")),
        ]
    }
}

#[async_trait]
impl DefinitionSource for DirectoryDefinitionSource {
    async fn load(&self, kanban_id: &str) -> Result<WorkflowDefinition, DefinitionError> {
        for path in self.candidates(kanban_id) {
            if fs::try_exists(&path).await.unwrap_or(false) {
                debug!(kanban_id, path = %path.display(), "Loading workflow definition");
                let def = load_from_file(&path).await?;
                if def.kanban_id != kanban_id {
                    return Err(DefinitionError::Mismatch {
                        requested: kanban_id.to_string(),
                        found: def.kanban_id,
                    });
                }
                return Ok(def);
            }
        }
        Err(DefinitionError::NotFound(kanban_id.to_string()))
    }
}
