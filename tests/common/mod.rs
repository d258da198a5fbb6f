//! Shared fixtures for the integration tests

#![allow(dead_code)]

use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kanban_engine::definition::{ComparisonOperator, PrerequisiteCheck};
use kanban_engine::transition::{AlertNotifier, TransitionAlert};
use kanban_engine::{
    InMemoryDefinitionSource, InMemoryProcessStore, KanbanEngineConfig, PrerequisiteSpec, StateDefinition,
    WorkflowDefinition, WorkflowEngine, WorkflowEngineBuilder,
};

pub fn is_true(field: &str) -> PrerequisiteSpec {
    PrerequisiteSpec::new(
        PrerequisiteCheck::field_check(field, ComparisonOperator::IsTrue, Value::Null),
        format!("{field} must be true"),
    )
}

/// orcamento → pedido (aprovado_cliente) → entrega (pagamento_recebido) → concluido (final)
pub fn vendas() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "vendas",
        "orcamento",
        vec![
            StateDefinition::new("orcamento"),
            StateDefinition::new("pedido").with_prerequisite(is_true("aprovado_cliente")),
            StateDefinition::new("entrega").with_prerequisite(is_true("pagamento_recebido")),
            StateDefinition::new("concluido").final_state(),
            StateDefinition::new("cancelado").final_state(),
        ],
    )
    .with_flow_sequence(vec![
        "orcamento".into(),
        "pedido".into(),
        "entrega".into(),
        "concluido".into(),
    ])
}

/// A linear flow of `len` prerequisite-free states, the last one final
pub fn linear(kanban_id: &str, len: usize) -> WorkflowDefinition {
    let states: Vec<StateDefinition> = (0..len)
        .map(|i| {
            let state = StateDefinition::new(format!("etapa_{i}"));
            if i + 1 == len {
                state.final_state()
            } else {
                state
            }
        })
        .collect();
    WorkflowDefinition::new(kanban_id, "etapa_0", states)
}

pub fn data(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub fn flags(aprovado: bool, pago: bool) -> Map<String, Value> {
    data(json!({"aprovado_cliente": aprovado, "pagamento_recebido": pago}))
}

pub fn builder(definitions: Vec<WorkflowDefinition>) -> (WorkflowEngineBuilder, Arc<InMemoryProcessStore>) {
    let source = Arc::new(InMemoryDefinitionSource::with_definitions(definitions));
    let store = Arc::new(InMemoryProcessStore::new());
    (WorkflowEngine::builder(source, store.clone()), store)
}

pub fn engine(definitions: Vec<WorkflowDefinition>) -> (WorkflowEngine, Arc<InMemoryProcessStore>) {
    let (builder, store) = builder(definitions);
    (builder.build().unwrap(), store)
}

pub fn engine_with_config(
    definitions: Vec<WorkflowDefinition>,
    config: KanbanEngineConfig,
) -> (WorkflowEngine, Arc<InMemoryProcessStore>) {
    let (builder, store) = builder(definitions);
    (builder.config(config).build().unwrap(), store)
}

/// Notifier that keeps every alert it receives
#[derive(Default)]
pub struct RecordingNotifier {
    pub alerts: Mutex<Vec<TransitionAlert>>,
}

impl RecordingNotifier {
    pub fn received(&self) -> Vec<TransitionAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertNotifier for RecordingNotifier {
    async fn notify(&self, alert: &TransitionAlert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }
}
