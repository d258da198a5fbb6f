use anyhow::Result;

use crate::audit::{format_compliance_report, TimeWindow};
use crate::cli::workspace::Workspace;

pub struct ComplianceCommand {
    pub kanban_id: String,
    pub hours: Option<u64>,
    pub all: bool,
    pub json: bool,
}

impl ComplianceCommand {
    pub fn new(kanban_id: String, hours: Option<u64>, all: bool, json: bool) -> Self {
        Self {
            kanban_id,
            hours,
            all,
            json,
        }
    }

    pub fn window(&self, default_hours: u64) -> TimeWindow {
        if self.all {
            TimeWindow::All
        } else {
            TimeWindow::LastHours(self.hours.unwrap_or(default_hours))
        }
    }

    pub async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let window = self.window(workspace.config().audit.compliance_window_hours);

        workspace
            .run(|engine| async move {
                let snapshot = engine.audit().compliance_score(&self.kanban_id, window).await?;
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                } else {
                    print!("{}", format_compliance_report(&snapshot));
                }
                Ok(())
            })
            .await
    }
}
