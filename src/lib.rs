// Kanban workflow transition engine
// Prerequisite evaluation, three-actor transitions, bounded auto-progression
// and an append-only audit trail with compliance scoring.

pub mod audit;
pub mod cli;
pub mod config;
pub mod definition;
pub mod engine;
pub mod observability;
pub mod prerequisites;
pub mod process;
pub mod progression;
pub mod shutdown;
pub mod telemetry;
pub mod transition;

// Re-export key types for easy access
pub use audit::{
    format_compliance_report, AuditEntry, AuditQuery, AuditSink, AuditTrail, ComplianceSnapshot, JsonlAuditSink,
    TimeWindow,
};
pub use config::{config, init_config, KanbanEngineConfig};
pub use definition::{
    DefinitionError, DefinitionRegistry, DefinitionSource, DirectoryDefinitionSource, InMemoryDefinitionSource,
    PrerequisiteCheck, PrerequisiteSpec, StateDefinition, WorkflowDefinition,
};
pub use engine::{CreatedProcess, WorkflowEngine, WorkflowEngineBuilder};
pub use observability::{engine_metrics, EngineMetrics, OperationTimer};
pub use prerequisites::{EvaluationReport, PrerequisiteEvaluator, PrerequisiteResult, ScriptHandler, ScriptRegistry};
pub use process::{
    ActorType, InMemoryProcessStore, ProcessFilter, ProcessInstance, ProcessStore, StoreError, TransitionRecord,
};
pub use progression::{AutoProgression, ProgressionReport, ProgressionSweeper, StopReason, SweepReport};
pub use shutdown::ShutdownCoordinator;
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use transition::{
    AlertNotifier, JustificationPolicy, Signal, SignalCollaborator, TransitionAlert, TransitionError,
    TransitionExecutor, TransitionOutcome, TransitionRequest,
};
