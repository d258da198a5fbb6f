use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::audit::{AuditSink, AuditTrail, JsonlAuditSink};
use crate::config::KanbanEngineConfig;
use crate::definition::{DefinitionRegistry, DefinitionSource};
use crate::prerequisites::{PrerequisiteEvaluator, RateLimitedApiClient, ScriptHandler, ScriptRegistry};
use crate::process::{ProcessInstance, ProcessStore};
use crate::progression::{AutoProgression, ProgressionReport, ProgressionSweeper, SweepReport};
use crate::telemetry::generate_correlation_id;
use crate::transition::{
    AlertNotifier, SignalCollaborator, TransitionError, TransitionExecutor, TransitionOutcome, TransitionRequest,
};

/// A freshly created process and what the initial cascade did with it
#[derive(Debug, Clone)]
pub struct CreatedProcess {
    pub process: ProcessInstance,
    pub progression: ProgressionReport,
}

/// Entry point wiring registry, store, evaluator, executor and audit trail
#[derive(Clone)]
pub struct WorkflowEngine {
    registry: Arc<DefinitionRegistry>,
    store: Arc<dyn ProcessStore>,
    executor: TransitionExecutor,
    progression: AutoProgression,
    audit: AuditTrail,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("registry", &self.registry)
            .field("executor", &self.executor)
            .finish()
    }
}

impl WorkflowEngine {
    pub fn builder(source: Arc<dyn DefinitionSource>, store: Arc<dyn ProcessStore>) -> WorkflowEngineBuilder {
        WorkflowEngineBuilder::new(source, store)
    }

    /// Create a process at the definition's initial state, then advance it once
    pub async fn create_process(
        &self,
        kanban_id: &str,
        process_id: Option<String>,
        process_data: Map<String, Value>,
    ) -> Result<CreatedProcess, TransitionError> {
        let definition = self.registry.get(kanban_id).await?;
        let process_id = process_id.unwrap_or_else(generate_correlation_id);

        let process = ProcessInstance::new(&process_id, kanban_id, &definition.initial_state, process_data);
        self.store.insert(process).await?;
        info!(process_id = %process_id, kanban_id, state = %definition.initial_state, "Process created");

        let progression = self.progression.progress(&process_id).await?;
        let process = self
            .store
            .get(&process_id)
            .await?
            .ok_or_else(|| TransitionError::ProcessNotFound(process_id.clone()))?;

        Ok(CreatedProcess { process, progression })
    }

    /// External data update: write one `process_data` field under the process lock
    pub async fn set_field(
        &self,
        process_id: &str,
        path: &str,
        value: Value,
    ) -> Result<ProcessInstance, TransitionError> {
        let _guard = self.executor.locks().acquire(process_id).await;
        let mut process = self
            .store
            .get(process_id)
            .await?
            .ok_or_else(|| TransitionError::ProcessNotFound(process_id.to_string()))?;

        let expected_version = process.version;
        process.set_field(path, value);
        process.updated_at = Utc::now();
        process.version = self.store.save(&process, expected_version).await?;
        debug!(process_id, field = path, version = process.version, "Process data updated");
        Ok(process)
    }

    pub async fn transition(&self, request: TransitionRequest) -> Result<ProcessInstance, TransitionError> {
        self.executor.transition(request).await
    }

    pub async fn execute(&self, request: TransitionRequest) -> Result<TransitionOutcome, TransitionError> {
        self.executor.execute(request).await
    }

    pub async fn check_and_advance(&self, process_id: &str) -> Result<usize, TransitionError> {
        self.progression.check_and_advance(process_id).await
    }

    pub async fn progress(&self, process_id: &str) -> Result<ProgressionReport, TransitionError> {
        self.progression.progress(process_id).await
    }

    pub async fn advance_all(&self, kanban_id: &str) -> Result<SweepReport, TransitionError> {
        self.progression.advance_all(kanban_id).await
    }

    pub async fn advance_all_until(
        &self,
        kanban_id: &str,
        shutdown: watch::Receiver<bool>,
    ) -> Result<SweepReport, TransitionError> {
        self.progression.advance_all_until(kanban_id, shutdown).await
    }

    pub fn sweeper(&self, kanban_ids: Vec<String>, period: std::time::Duration) -> ProgressionSweeper {
        ProgressionSweeper::new(self.progression.clone(), kanban_ids, period)
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn registry(&self) -> &Arc<DefinitionRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ProcessStore> {
        &self.store
    }

    pub fn executor(&self) -> &TransitionExecutor {
        &self.executor
    }
}

pub struct WorkflowEngineBuilder {
    source: Arc<dyn DefinitionSource>,
    store: Arc<dyn ProcessStore>,
    config: KanbanEngineConfig,
    scripts: ScriptRegistry,
    notifier: Option<Arc<dyn AlertNotifier>>,
    signals: Option<Arc<dyn SignalCollaborator>>,
    audit_sink: Option<Arc<dyn AuditSink>>,
}

impl WorkflowEngineBuilder {
    pub fn new(source: Arc<dyn DefinitionSource>, store: Arc<dyn ProcessStore>) -> Self {
        Self {
            source,
            store,
            config: KanbanEngineConfig::default(),
            scripts: ScriptRegistry::new(),
            notifier: None,
            signals: None,
            audit_sink: None,
        }
    }

    pub fn config(mut self, config: KanbanEngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn script_handler(mut self, name: impl Into<String>, handler: Arc<dyn ScriptHandler>) -> Self {
        self.scripts.register(name, handler);
        self
    }

    pub fn script_fn<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.scripts.register_fn(name, f);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn AlertNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn signals(mut self, signals: Arc<dyn SignalCollaborator>) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    pub fn build(self) -> anyhow::Result<WorkflowEngine> {
        let config = self.config;

        let registry = Arc::new(match config.definition_cache_ttl() {
            Some(ttl) => DefinitionRegistry::with_ttl(self.source, ttl),
            None => DefinitionRegistry::new(self.source),
        });
        let client = RateLimitedApiClient::new(
            config.prerequisites.requests_per_second,
            config.prerequisites.burst_capacity,
        )?;
        let evaluator = Arc::new(PrerequisiteEvaluator::new(
            client,
            Arc::new(self.scripts),
            config.evaluator_settings(),
        ));

        let mut executor = TransitionExecutor::new(registry.clone(), self.store.clone(), evaluator)
            .with_policy(config.justification_policy())
            .with_settings(config.executor_settings());
        if let Some(notifier) = self.notifier {
            executor = executor.with_notifier(notifier);
        }
        if let Some(signals) = self.signals {
            executor = executor.with_signals(signals);
        }
        let sink = self.audit_sink.or_else(|| {
            config
                .audit
                .jsonl_path
                .as_ref()
                .map(|path| Arc::new(JsonlAuditSink::new(path)) as Arc<dyn AuditSink>)
        });
        if let Some(sink) = sink {
            executor = executor.with_audit_sink(sink);
        }

        let progression = AutoProgression::new(executor.clone()).with_concurrency(config.engine.sweep_concurrency);
        let audit = AuditTrail::new(self.store.clone()).with_settings(config.compliance_settings());

        Ok(WorkflowEngine {
            registry,
            store: self.store,
            executor,
            progression,
            audit,
        })
    }
}
