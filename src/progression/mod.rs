// Auto-progression: move a process forward along the flow sequence while
// the next state's prerequisites hold, one locked step at a time.

pub mod sweeper;

pub use sweeper::ProgressionSweeper;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

use crate::observability::engine_metrics;
use crate::process::ProcessFilter;
use crate::telemetry::{create_operation_span, generate_correlation_id};
use crate::transition::{TransitionError, TransitionExecutor, TransitionRequest};

pub const DEFAULT_SWEEP_CONCURRENCY: usize = 8;

/// Why a cascade stopped. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Current state is the last one in the flow sequence
    EndOfFlow,
    /// Next state is final and must be entered by a user or agent
    FinalState,
    PrerequisitesUnmet,
    CascadeLimitReached,
    /// Current state is not part of the flow sequence
    NotInFlow,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            StopReason::EndOfFlow => "end of flow",
            StopReason::FinalState => "next state is final",
            StopReason::PrerequisitesUnmet => "prerequisites unmet",
            StopReason::CascadeLimitReached => "cascade limit reached",
            StopReason::NotInFlow => "state not in flow sequence",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionReport {
    pub process_id: String,
    pub steps_advanced: usize,
    pub stop_reason: StopReason,
}

/// Outcome of advancing every process of one kanban
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub kanban_id: String,
    pub examined: usize,
    pub advanced: Vec<ProgressionReport>,
    pub failures: Vec<(String, String)>,
    /// Set when the sweep stopped early on shutdown
    pub cancelled: bool,
}

impl SweepReport {
    pub fn total_steps(&self) -> usize {
        self.advanced.iter().map(|r| r.steps_advanced).sum()
    }
}

#[derive(Debug, Clone)]
pub struct AutoProgression {
    executor: TransitionExecutor,
    concurrency: usize,
}

impl AutoProgression {
    pub fn new(executor: TransitionExecutor) -> Self {
        Self {
            executor,
            concurrency: DEFAULT_SWEEP_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Advance as far as allowed and return the number of steps taken
    pub async fn check_and_advance(&self, process_id: &str) -> Result<usize, TransitionError> {
        self.progress(process_id).await.map(|r| r.steps_advanced)
    }

    pub async fn progress(&self, process_id: &str) -> Result<ProgressionReport, TransitionError> {
        let mut steps = 0usize;

        let stop_reason = loop {
            // Load, evaluate and commit under one lock so the state we
            // evaluated is the state we move from.
            let _guard = self.executor.locks().acquire(process_id).await;

            let process = self
                .executor
                .store()
                .get(process_id)
                .await?
                .ok_or_else(|| TransitionError::ProcessNotFound(process_id.to_string()))?;
            let definition = self.executor.registry().get(&process.kanban_id).await?;

            if definition.position(&process.current_state).is_none() {
                break StopReason::NotInFlow;
            }
            let Some(next) = definition.next_in_flow(&process.current_state) else {
                break StopReason::EndOfFlow;
            };
            if next.is_final && !definition.auto_enter_final {
                break StopReason::FinalState;
            }

            let limit = definition.cascade_depth(self.executor.settings().default_max_cascade_depth) as usize;
            if steps >= limit {
                engine_metrics().record_cascade_limit_hit();
                info!(process_id, limit, "Cascade depth limit reached");
                break StopReason::CascadeLimitReached;
            }

            let report = self
                .executor
                .evaluator()
                .evaluate_all(&process, &next.prerequisites)
                .await;
            if !report.all_satisfied {
                break StopReason::PrerequisitesUnmet;
            }

            let request = TransitionRequest::system(process_id, next.id.clone()).without_auto_progression();
            self.executor
                .commit_locked(process, &definition, &request, report)
                .await?;

            steps += 1;
            engine_metrics().record_cascade_step();
        };

        debug!(process_id, steps, reason = %stop_reason, "Auto-progression stopped");
        Ok(ProgressionReport {
            process_id: process_id.to_string(),
            steps_advanced: steps,
            stop_reason,
        })
    }

    pub async fn advance_all(&self, kanban_id: &str) -> Result<SweepReport, TransitionError> {
        let (_tx, rx) = watch::channel(false);
        self.advance_all_until(kanban_id, rx).await
    }

    /// Sweep every non-final process of a kanban. Shutdown is honoured
    /// between processes, never in the middle of one.
    pub async fn advance_all_until(
        &self,
        kanban_id: &str,
        shutdown: watch::Receiver<bool>,
    ) -> Result<SweepReport, TransitionError> {
        let span = create_operation_span("sweep", Some(kanban_id), &generate_correlation_id());
        self.sweep(kanban_id, shutdown).instrument(span).await
    }

    async fn sweep(
        &self,
        kanban_id: &str,
        shutdown: watch::Receiver<bool>,
    ) -> Result<SweepReport, TransitionError> {
        let definition = self.executor.registry().get(kanban_id).await?;
        let candidates: Vec<String> = self
            .executor
            .store()
            .find(&ProcessFilter::kanban(kanban_id))
            .await?
            .into_iter()
            .filter(|p| !definition.is_final(&p.current_state))
            .map(|p| p.process_id)
            .collect();

        let mut report = SweepReport {
            kanban_id: kanban_id.to_string(),
            examined: candidates.len(),
            ..SweepReport::default()
        };

        let results: Vec<(String, Option<Result<ProgressionReport, TransitionError>>)> =
            stream::iter(candidates)
                .map(|process_id| {
                    let shutdown = shutdown.clone();
                    async move {
                        if *shutdown.borrow() {
                            return (process_id, None);
                        }
                        let result = self.progress(&process_id).await;
                        (process_id, Some(result))
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        for (process_id, result) in results {
            match result {
                None => report.cancelled = true,
                Some(Ok(progress)) if progress.steps_advanced > 0 => report.advanced.push(progress),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(process_id = %process_id, error = %e, "Sweep could not advance process");
                    report.failures.push((process_id, e.to_string()));
                }
            }
        }
        report.advanced.sort_by(|a, b| a.process_id.cmp(&b.process_id));

        let pruned = self.executor.locks().prune();
        if pruned > 0 {
            debug!(kanban_id, pruned, "Released idle process locks");
        }

        info!(
            kanban_id,
            examined = report.examined,
            advanced = report.advanced.len(),
            steps = report.total_steps(),
            failures = report.failures.len(),
            cancelled = report.cancelled,
            "Sweep finished"
        );
        Ok(report)
    }
}
