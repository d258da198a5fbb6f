use anyhow::{Context, Result};
use serde_json::{Map, Value};

use super::print_progression;
use crate::cli::workspace::Workspace;

pub struct CreateCommand {
    pub kanban_id: String,
    pub process_id: Option<String>,
    pub data: String,
}

impl CreateCommand {
    pub fn new(kanban_id: String, process_id: Option<String>, data: String) -> Self {
        Self {
            kanban_id,
            process_id,
            data,
        }
    }

    pub async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let data: Map<String, Value> =
            serde_json::from_str(&self.data).context("--data must be a JSON object")?;

        workspace
            .run(|engine| async move {
                let created = engine
                    .create_process(&self.kanban_id, self.process_id.clone(), data)
                    .await?;
                println!(
                    "🆕 Created process {} in {} at '{}'",
                    created.process.process_id, self.kanban_id, created.process.current_state
                );
                print_progression(&created.progression);
                Ok(())
            })
            .await
    }
}
