use anyhow::Result;

use crate::cli::workspace::Workspace;
use crate::progression::SweepReport;

pub struct SweepCommand {
    pub kanban_ids: Vec<String>,
}

impl SweepCommand {
    pub fn new(kanban_ids: Vec<String>) -> Self {
        Self { kanban_ids }
    }

    pub async fn execute(&self, workspace: &Workspace) -> Result<()> {
        workspace
            .run(|engine| async move {
                for kanban_id in &self.kanban_ids {
                    let report = engine.advance_all(kanban_id).await?;
                    print_sweep(&report);
                }
                Ok(())
            })
            .await
    }
}

pub fn print_sweep(report: &SweepReport) {
    println!(
        "⏩ {}: examined {} process(es), advanced {} by {} step(s)",
        report.kanban_id,
        report.examined,
        report.advanced.len(),
        report.total_steps()
    );
    for progress in &report.advanced {
        println!(
            "   • {}: {} step(s), stopped: {}",
            progress.process_id, progress.steps_advanced, progress.stop_reason
        );
    }
    for (process_id, error) in &report.failures {
        println!("   ❌ {process_id}: {error}");
    }
}
