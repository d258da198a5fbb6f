use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use super::{AutoProgression, SweepReport};

/// Periodically sweeps a set of kanbans until told to stop
#[derive(Debug, Clone)]
pub struct ProgressionSweeper {
    progression: AutoProgression,
    kanban_ids: Vec<String>,
    period: Duration,
}

impl ProgressionSweeper {
    pub fn new(progression: AutoProgression, kanban_ids: Vec<String>, period: Duration) -> Self {
        Self {
            progression,
            kanban_ids,
            period,
        }
    }

    /// Run one pass over every configured kanban
    pub async fn sweep_once(&self, shutdown: &watch::Receiver<bool>) -> Vec<SweepReport> {
        let mut reports = Vec::with_capacity(self.kanban_ids.len());
        for kanban_id in &self.kanban_ids {
            if *shutdown.borrow() {
                break;
            }
            match self.progression.advance_all_until(kanban_id, shutdown.clone()).await {
                Ok(report) => reports.push(report),
                Err(e) => error!(kanban_id = %kanban_id, error = %e, "Sweep failed"),
            }
        }
        reports
    }

    /// Tick until the shutdown flag becomes true or `max_passes` is reached.
    /// Returns the number of passes run.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>, max_passes: Option<usize>) -> usize {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut passes = 0;

        info!(kanbans = ?self.kanban_ids, period_secs = self.period.as_secs_f64(), "Progression sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    self.sweep_once(&shutdown).await;
                    passes += 1;
                    if max_passes.is_some_and(|max| passes >= max) {
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

        info!(passes, "Progression sweeper stopped");
        passes
    }
}
