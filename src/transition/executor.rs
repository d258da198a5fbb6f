use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};

use super::alerts::{AlertNotifier, SignalCollaborator, TracingAlertNotifier, TransitionAlert};
use super::errors::TransitionError;
use super::policy::JustificationPolicy;
use crate::audit::AuditSink;
use crate::definition::{DefinitionRegistry, WorkflowDefinition, DEFAULT_MAX_CASCADE_DEPTH};
use crate::observability::{create_transition_span, engine_metrics, OperationTimer};
use crate::prerequisites::{EvaluationReport, PrerequisiteEvaluator};
use crate::process::{ActorType, ProcessInstance, ProcessLocks, ProcessStore, TransitionRecord};
use crate::progression::{AutoProgression, ProgressionReport};
use crate::telemetry::generate_correlation_id;

pub const TRIGGER_MANUAL: &str = "manual";
pub const TRIGGER_AGENT: &str = "agent_suggestion";
pub const TRIGGER_PREREQUISITE_MET: &str = "prerequisite_met";

/// One requested state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub process_id: String,
    pub to_state: String,
    pub actor: String,
    pub actor_type: ActorType,
    pub trigger: String,
    pub justification: Option<String>,
    /// Skip the cascade after commit (set by the cascade itself)
    pub suppress_auto_progression: bool,
}

impl TransitionRequest {
    pub fn user(process_id: impl Into<String>, to_state: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            to_state: to_state.into(),
            actor: actor.into(),
            actor_type: ActorType::User,
            trigger: TRIGGER_MANUAL.to_string(),
            justification: None,
            suppress_auto_progression: false,
        }
    }

    pub fn agent(
        process_id: impl Into<String>,
        to_state: impl Into<String>,
        agent: impl Into<String>,
        justification: Option<String>,
    ) -> Self {
        Self {
            process_id: process_id.into(),
            to_state: to_state.into(),
            actor: agent.into(),
            actor_type: ActorType::Agent,
            trigger: TRIGGER_AGENT.to_string(),
            justification,
            suppress_auto_progression: false,
        }
    }

    pub fn system(process_id: impl Into<String>, to_state: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            to_state: to_state.into(),
            actor: "system".to_string(),
            actor_type: ActorType::System,
            trigger: TRIGGER_PREREQUISITE_MET.to_string(),
            justification: None,
            suppress_auto_progression: false,
        }
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = Some(justification.into());
        self
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = trigger.into();
        self
    }

    pub fn without_auto_progression(mut self) -> Self {
        self.suppress_auto_progression = true;
        self
    }
}

/// Everything a caller may want to know about a committed transition
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// State after the transition and any cascade that followed it
    pub process: ProcessInstance,
    pub record: TransitionRecord,
    /// One message per unmet prerequisite; informational only
    pub advisories: Vec<String>,
    pub alerts: Vec<String>,
    pub cascade: Option<ProgressionReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    pub default_max_cascade_depth: u32,
    pub signal_timeout: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            default_max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            signal_timeout: Duration::from_millis(500),
        }
    }
}

/// Result of a successful commit, before alerting and cascading
pub(crate) struct Committed {
    pub process: ProcessInstance,
    pub record: TransitionRecord,
    pub report: EvaluationReport,
    pub is_backward: bool,
}

/// Applies single transitions. Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct TransitionExecutor {
    registry: Arc<DefinitionRegistry>,
    store: Arc<dyn ProcessStore>,
    evaluator: Arc<PrerequisiteEvaluator>,
    locks: Arc<ProcessLocks>,
    policy: JustificationPolicy,
    notifier: Arc<dyn AlertNotifier>,
    signals: Option<Arc<dyn SignalCollaborator>>,
    audit_sink: Option<Arc<dyn AuditSink>>,
    settings: ExecutorSettings,
}

impl std::fmt::Debug for TransitionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionExecutor")
            .field("policy", &self.policy)
            .field("settings", &self.settings)
            .field("signals", &self.signals.is_some())
            .field("audit_sink", &self.audit_sink.is_some())
            .finish()
    }
}

impl TransitionExecutor {
    pub fn new(
        registry: Arc<DefinitionRegistry>,
        store: Arc<dyn ProcessStore>,
        evaluator: Arc<PrerequisiteEvaluator>,
    ) -> Self {
        Self {
            registry,
            store,
            evaluator,
            locks: Arc::new(ProcessLocks::new()),
            policy: JustificationPolicy::default(),
            notifier: Arc::new(TracingAlertNotifier),
            signals: None,
            audit_sink: None,
            settings: ExecutorSettings::default(),
        }
    }

    pub fn with_policy(mut self, policy: JustificationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn AlertNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_signals(mut self, signals: Arc<dyn SignalCollaborator>) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    pub fn with_settings(mut self, settings: ExecutorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub(crate) fn registry(&self) -> &Arc<DefinitionRegistry> {
        &self.registry
    }

    pub(crate) fn store(&self) -> &Arc<dyn ProcessStore> {
        &self.store
    }

    pub(crate) fn evaluator(&self) -> &Arc<PrerequisiteEvaluator> {
        &self.evaluator
    }

    pub fn locks(&self) -> &Arc<ProcessLocks> {
        &self.locks
    }

    /// Apply the transition and return the resulting process
    pub async fn transition(&self, request: TransitionRequest) -> Result<ProcessInstance, TransitionError> {
        self.execute(request).await.map(|outcome| outcome.process)
    }

    pub async fn execute(&self, request: TransitionRequest) -> Result<TransitionOutcome, TransitionError> {
        let correlation_id = generate_correlation_id();
        let span = create_transition_span(&request.process_id, &request.to_state, &correlation_id);

        async move {
            let timer = OperationTimer::new("transition");

            let committed = {
                let _guard = self.locks.acquire(&request.process_id).await;
                self.execute_locked(&request).await
            };
            let committed = match committed {
                Ok(c) => c,
                Err(e) => {
                    if e.is_rejection() {
                        engine_metrics().record_rejection();
                    }
                    warn!(error = %e, actor = %request.actor, actor_type = %request.actor_type, "Transition refused");
                    return Err(e);
                }
            };

            let advisories = committed.report.advisories();
            for advisory in &advisories {
                info!(process_id = %request.process_id, advisory = %advisory, "Prerequisite advisory");
            }

            let alerts = self.raise_alerts(&committed).await;

            let mut process = committed.process;
            let cascade = if request.suppress_auto_progression {
                None
            } else {
                match AutoProgression::new(self.clone()).progress(&request.process_id).await {
                    Ok(report) => {
                        if report.steps_advanced > 0 {
                            match self.store.get(&request.process_id).await {
                                Ok(Some(latest)) => process = latest,
                                Ok(None) => {}
                                // the cascade is committed; report the pre-cascade process
                                Err(e) => warn!(error = %e, "Reloading process after auto-progression failed"),
                            }
                        }
                        Some(report)
                    }
                    Err(e) => {
                        // the requested transition is already committed
                        warn!(error = %e, "Auto-progression after transition failed");
                        None
                    }
                }
            };

            timer.finish();
            Ok(TransitionOutcome {
                process,
                record: committed.record,
                advisories,
                alerts,
                cascade,
            })
        }
        .instrument(span)
        .await
    }

    async fn execute_locked(&self, request: &TransitionRequest) -> Result<Committed, TransitionError> {
        let process = self
            .store
            .get(&request.process_id)
            .await?
            .ok_or_else(|| TransitionError::ProcessNotFound(request.process_id.clone()))?;
        let definition = self.registry.get(&process.kanban_id).await?;

        let Some(target) = definition.state(&request.to_state) else {
            return Err(TransitionError::InvalidState {
                kanban_id: definition.kanban_id.clone(),
                state: request.to_state.clone(),
            });
        };

        let report = self.evaluator.evaluate_all(&process, &target.prerequisites).await;
        self.commit_locked(process, &definition, request, report).await
    }

    /// Classify, apply policy, append the record and persist.
    /// Caller must hold the process lock.
    pub(crate) async fn commit_locked(
        &self,
        mut process: ProcessInstance,
        definition: &WorkflowDefinition,
        request: &TransitionRequest,
        report: EvaluationReport,
    ) -> Result<Committed, TransitionError> {
        let from_state = process.current_state.clone();
        let is_backward = definition.is_backward(&from_state, &request.to_state);
        let forced = is_backward || !report.all_satisfied;

        if !definition.declares_transition(&from_state, &request.to_state) {
            info!(
                from = %from_state,
                to = %request.to_state,
                "Transition is outside the declared transition graph"
            );
        }

        let justification = self
            .policy
            .resolve(request.actor_type, forced, request.justification.as_deref())
            .map_err(|_| TransitionError::MissingJustification {
                process_id: process.process_id.clone(),
                to_state: request.to_state.clone(),
                actor_type: request.actor_type,
            })?;

        let now = Utc::now();
        let record = TransitionRecord {
            timestamp: now,
            from_state: from_state.clone(),
            to_state: request.to_state.clone(),
            actor: request.actor.clone(),
            actor_type: request.actor_type,
            trigger: request.trigger.clone(),
            forced,
            justification,
            prerequisites_checked: report.results.clone(),
        };

        let expected_version = process.version;
        process.previous_state = Some(from_state);
        process.current_state = request.to_state.clone();
        process.updated_at = now;
        process.history.push(record.clone());

        let new_version = match self.store.save(&process, expected_version).await {
            Ok(v) => v,
            Err(e) => {
                let err = TransitionError::from(e);
                if matches!(err, TransitionError::ConcurrentModification { .. }) {
                    engine_metrics().record_concurrency_conflict();
                }
                return Err(err);
            }
        };
        process.version = new_version;

        engine_metrics().record_transition(forced);
        info!(
            process_id = %process.process_id,
            from = %record.from_state,
            to = %record.to_state,
            actor = %record.actor,
            actor_type = %record.actor_type,
            forced,
            is_backward,
            version = new_version,
            "Transition committed"
        );

        if let Some(sink) = &self.audit_sink {
            if let Err(e) = sink.record(&process, &record).await {
                warn!(error = %e, "Audit sink failed to record transition");
            }
        }

        Ok(Committed {
            process,
            record,
            report,
            is_backward,
        })
    }

    async fn raise_alerts(&self, committed: &Committed) -> Vec<String> {
        let record = &committed.record;
        if record.actor_type == ActorType::System {
            return Vec::new();
        }

        let mut reasons = Vec::new();
        if committed.is_backward {
            reasons.push(format!("backward move {} -> {}", record.from_state, record.to_state));
        }
        if !committed.report.all_satisfied {
            let unmet: Vec<&str> = committed.report.unmet().map(|(id, _)| id.as_str()).collect();
            reasons.push(format!("unmet prerequisites: {}", unmet.join(", ")));
        }
        reasons.extend(committed.report.alerts());

        if let Some(signals) = &self.signals {
            let assessment = tokio::time::timeout(
                self.settings.signal_timeout,
                signals.assess(&committed.process, record),
            )
            .await;
            match assessment {
                Ok(Ok(signal)) if signal.unusual => reasons.push(format!(
                    "unusual activity: {}",
                    signal.reason.unwrap_or_else(|| "flagged by signal collaborator".into())
                )),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => debug!(error = %e, "Signal collaborator failed"),
                Err(_) => debug!("Signal collaborator timed out"),
            }
        }

        if reasons.is_empty() {
            return reasons;
        }

        let alert = TransitionAlert {
            process_id: committed.process.process_id.clone(),
            kanban_id: committed.process.kanban_id.clone(),
            from_state: record.from_state.clone(),
            to_state: record.to_state.clone(),
            actor: record.actor.clone(),
            actor_type: record.actor_type,
            forced: record.forced,
            justification: record.justification.clone(),
            reasons: reasons.clone(),
        };
        self.notifier.notify(&alert).await;
        reasons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{
        ComparisonOperator, InMemoryDefinitionSource, PrerequisiteCheck, PrerequisiteSpec, StateDefinition,
    };
    use crate::prerequisites::{EvaluatorSettings, RateLimitedApiClient, ScriptRegistry};
    use crate::process::InMemoryProcessStore;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    mockall::mock! {
        Notifier {}
        #[async_trait]
        impl AlertNotifier for Notifier {
            async fn notify(&self, alert: &TransitionAlert);
        }
    }

    fn definition() -> WorkflowDefinition {
        let approved = PrerequisiteSpec::new(
            PrerequisiteCheck::field_check("aprovado", ComparisonOperator::IsTrue, Value::Null),
            "Aprovação registrada",
        );
        WorkflowDefinition::new(
            "fluxo",
            "a",
            vec![
                StateDefinition::new("a"),
                StateDefinition::new("b").with_prerequisite(approved),
                StateDefinition::new("c").final_state(),
            ],
        )
    }

    async fn executor(notifier: Arc<dyn AlertNotifier>) -> (TransitionExecutor, Arc<InMemoryProcessStore>) {
        let source = Arc::new(InMemoryDefinitionSource::with_definitions([definition()]));
        let registry = Arc::new(DefinitionRegistry::new(source));
        let store = Arc::new(InMemoryProcessStore::new());
        let evaluator = Arc::new(PrerequisiteEvaluator::new(
            RateLimitedApiClient::new(10, 10).unwrap(),
            Arc::new(ScriptRegistry::new()),
            EvaluatorSettings::default(),
        ));
        let process = ProcessInstance::new("p1", "fluxo", "a", json!({"aprovado": false}).as_object().unwrap().clone());
        store.insert(process).await.unwrap();

        let executor = TransitionExecutor::new(registry, store.clone(), evaluator).with_notifier(notifier);
        (executor, store)
    }

    #[tokio::test]
    async fn test_forced_user_transition_notifies_once() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|alert| alert.forced && alert.to_state == "b")
            .times(1)
            .return_const(());
        let (executor, _) = executor(Arc::new(notifier)).await;

        let outcome = executor
            .execute(TransitionRequest::user("p1", "b", "ana"))
            .await
            .unwrap();
        assert!(outcome.record.forced);
        assert_eq!(outcome.advisories.len(), 1);
        assert_eq!(outcome.process.current_state, "b");
        assert_eq!(outcome.process.version, 1);
    }

    #[tokio::test]
    async fn test_system_transition_never_notifies() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);
        let (executor, _) = executor(Arc::new(notifier)).await;

        let outcome = executor
            .execute(TransitionRequest::system("p1", "b").with_justification("ignored"))
            .await
            .unwrap();
        assert!(outcome.record.forced);
        assert_eq!(outcome.record.justification, None);
        assert!(outcome.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_state_is_rejected() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);
        let (executor, store) = executor(Arc::new(notifier)).await;

        let err = executor
            .transition(TransitionRequest::user("p1", "zz", "ana"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidState { state, .. } if state == "zz"));

        let process = store.get("p1").await.unwrap().unwrap();
        assert_eq!(process.current_state, "a");
        assert!(process.history.is_empty());
    }

    #[tokio::test]
    async fn test_missing_process() {
        let (executor, _) = executor(Arc::new(TracingAlertNotifier)).await;
        let err = executor
            .transition(TransitionRequest::user("nope", "b", "ana"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::ProcessNotFound(_)));
    }
}
