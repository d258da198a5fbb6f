use anyhow::Result;

use super::print_progression;
use crate::cli::workspace::Workspace;

pub struct AdvanceCommand {
    pub process_id: String,
}

impl AdvanceCommand {
    pub fn new(process_id: String) -> Self {
        Self { process_id }
    }

    pub async fn execute(&self, workspace: &Workspace) -> Result<()> {
        workspace
            .run(|engine| async move {
                let report = engine.progress(&self.process_id).await?;
                print_progression(&report);
                if let Some(process) = engine.store().get(&self.process_id).await? {
                    println!("   Current state: {}", process.current_state);
                }
                Ok(())
            })
            .await
    }
}
