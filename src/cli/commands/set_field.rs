use anyhow::Result;

use super::{parse_value, print_progression};
use crate::cli::workspace::Workspace;

pub struct SetFieldCommand {
    pub process_id: String,
    pub path: String,
    pub value: String,
    pub advance: bool,
}

impl SetFieldCommand {
    pub fn new(process_id: String, path: String, value: String) -> Self {
        Self {
            process_id,
            path,
            value,
            advance: true,
        }
    }

    pub fn with_advance(mut self, advance: bool) -> Self {
        self.advance = advance;
        self
    }

    pub async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let value = parse_value(&self.value);

        workspace
            .run(|engine| async move {
                let process = engine.set_field(&self.process_id, &self.path, value).await?;
                println!(
                    "✏️  {}.{} = {}",
                    process.process_id,
                    self.path,
                    process.field(&self.path).cloned().unwrap_or_default()
                );

                if self.advance {
                    let report = engine.progress(&self.process_id).await?;
                    print_progression(&report);
                }
                Ok(())
            })
            .await
    }
}
