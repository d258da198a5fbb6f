use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::process::{ActorType, ProcessInstance, TransitionRecord};

/// Raised for user or agent transitions that deserve attention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionAlert {
    pub process_id: String,
    pub kanban_id: String,
    pub from_state: String,
    pub to_state: String,
    pub actor: String,
    pub actor_type: ActorType,
    pub forced: bool,
    pub justification: Option<String>,
    pub reasons: Vec<String>,
}

#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, alert: &TransitionAlert);
}

/// Default notifier: a structured warning in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertNotifier;

#[async_trait]
impl AlertNotifier for TracingAlertNotifier {
    async fn notify(&self, alert: &TransitionAlert) {
        warn!(
            process_id = %alert.process_id,
            kanban_id = %alert.kanban_id,
            from = %alert.from_state,
            to = %alert.to_state,
            actor = %alert.actor,
            actor_type = %alert.actor_type,
            forced = alert.forced,
            justification = alert.justification.as_deref().unwrap_or("-"),
            reasons = %alert.reasons.join("; "),
            "Transition alert"
        );
    }
}

/// Annotation from an optional pattern/anomaly component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub unusual: bool,
    pub reason: Option<String>,
}

/// Consulted after a user or agent transition is committed.
/// Its answer only changes what alerts say, never the transition itself.
#[async_trait]
pub trait SignalCollaborator: Send + Sync {
    async fn assess(&self, process: &ProcessInstance, record: &TransitionRecord) -> anyhow::Result<Signal>;
}
