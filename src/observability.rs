use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Transition engine counters
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub transitions: AtomicU64,
    pub forced_transitions: AtomicU64,
    pub rejected_transitions: AtomicU64,
    pub cascade_steps: AtomicU64,
    pub cascade_limit_hits: AtomicU64,
    pub prerequisite_errors: AtomicU64,
    pub concurrency_conflicts: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transition(&self, forced: bool) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
        if forced {
            self.forced_transitions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rejection(&self) {
        self.rejected_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cascade_step(&self) {
        self.cascade_steps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cascade_limit_hit(&self) {
        self.cascade_limit_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_prerequisite_error(&self) {
        self.prerequisite_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_concurrency_conflict(&self) {
        self.concurrency_conflicts.fetch_add(1, Ordering::Relaxed);
        warn!("Concurrent modification detected on save");
    }

    pub fn get_stats(&self) -> EngineStats {
        EngineStats {
            transitions: self.transitions.load(Ordering::Relaxed),
            forced_transitions: self.forced_transitions.load(Ordering::Relaxed),
            rejected_transitions: self.rejected_transitions.load(Ordering::Relaxed),
            cascade_steps: self.cascade_steps.load(Ordering::Relaxed),
            cascade_limit_hits: self.cascade_limit_hits.load(Ordering::Relaxed),
            prerequisite_errors: self.prerequisite_errors.load(Ordering::Relaxed),
            concurrency_conflicts: self.concurrency_conflicts.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Engine metrics: transitions={}, forced={}, rejected={}, cascade_steps={}, cascade_limits={}, prerequisite_errors={}, conflicts={}",
            stats.transitions,
            stats.forced_transitions,
            stats.rejected_transitions,
            stats.cascade_steps,
            stats.cascade_limit_hits,
            stats.prerequisite_errors,
            stats.concurrency_conflicts
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub transitions: u64,
    pub forced_transitions: u64,
    pub rejected_transitions: u64,
    pub cascade_steps: u64,
    pub cascade_limit_hits: u64,
    pub prerequisite_errors: u64,
    pub concurrency_conflicts: u64,
}

/// Global metrics instance
static ENGINE_METRICS: std::sync::LazyLock<EngineMetrics> = std::sync::LazyLock::new(EngineMetrics::new);

pub fn engine_metrics() -> &'static EngineMetrics {
    &ENGINE_METRICS
}

/// Span for one transition attempt, tagged with a correlation id
pub fn create_transition_span(process_id: &str, to_state: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "transition",
        process.id = process_id,
        transition.to = to_state,
        correlation.id = correlation_id
    )
}

/// Time an operation and log its duration on finish
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        debug!(
            operation = %self.operation,
            elapsed_ms = duration.as_millis() as u64,
            "Engine operation finished"
        );
    }
}
