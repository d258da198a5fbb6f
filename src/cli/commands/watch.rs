use anyhow::Result;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::warn;

use super::sweep::print_sweep;
use crate::cli::workspace::Workspace;
use crate::shutdown::ShutdownCoordinator;

pub struct WatchCommand {
    pub kanban_ids: Vec<String>,
    pub interval: Option<u64>,
    pub passes: Option<usize>,
}

impl WatchCommand {
    pub fn new(kanban_ids: Vec<String>) -> Self {
        Self {
            kanban_ids,
            interval: None,
            passes: None,
        }
    }

    pub fn with_interval(mut self, interval: Option<u64>) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_passes(mut self, passes: Option<usize>) -> Self {
        self.passes = passes;
        self
    }

    pub fn period(&self, workspace: &Workspace) -> Duration {
        self.interval
            .map(|secs| Duration::from_secs(secs.max(1)))
            .unwrap_or_else(|| workspace.config().sweep_interval())
    }

    pub async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let period = self.period(workspace);

        let coordinator = ShutdownCoordinator::new();
        coordinator.install_signal_handlers()?;

        println!(
            "👀 Watching {} every {}s (Ctrl-C to stop)",
            self.kanban_ids.join(", "),
            period.as_secs()
        );

        let passes = self.run(workspace, period, coordinator.subscribe()).await;
        println!("🛑 Stopped after {passes} sweep(s)");
        coordinator.finish();
        Ok(())
    }

    /// Each pass locks the workspace, sweeps, writes the snapshot and
    /// releases the lock, so other commands run between passes.
    async fn run(&self, workspace: &Workspace, period: Duration, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut passes = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    self.sweep_pass(workspace, period, &shutdown).await;
                    passes += 1;
                    if self.passes.is_some_and(|max| passes >= max) {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        passes
    }

    async fn sweep_pass(&self, workspace: &Workspace, period: Duration, shutdown: &watch::Receiver<bool>) {
        let pass = workspace
            .run(|engine| async move {
                Ok(engine
                    .sweeper(self.kanban_ids.clone(), period)
                    .sweep_once(shutdown)
                    .await)
            })
            .await;

        match pass {
            Ok(reports) => {
                for report in reports.iter().filter(|r| r.examined > 0) {
                    print_sweep(report);
                }
            }
            Err(e) => {
                warn!(error = %e, "Sweep pass skipped");
                println!("⚠️  Sweep pass skipped: {e}");
            }
        }
    }
}
