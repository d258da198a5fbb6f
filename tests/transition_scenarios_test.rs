//! End-to-end transition behaviour through the public engine API

mod common;

use common::{builder, data, engine, engine_with_config, flags, is_true, vendas, RecordingNotifier};
use kanban_engine::audit::TimeWindow;
use kanban_engine::transition::TRIGGER_AGENT;
use kanban_engine::{
    ActorType, KanbanEngineConfig, ProcessStore, StateDefinition, StopReason, TransitionError, TransitionRequest,
    WorkflowDefinition,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_process_waits_at_start_until_approval_then_moves_one_step() {
    let (engine, _) = engine(vec![vendas()]);

    let created = engine
        .create_process("vendas", Some("v-1".into()), flags(false, false))
        .await
        .unwrap();
    assert_eq!(created.process.current_state, "orcamento");
    assert_eq!(created.progression.stop_reason, StopReason::PrerequisitesUnmet);

    assert_eq!(engine.check_and_advance("v-1").await.unwrap(), 0);

    engine.set_field("v-1", "aprovado_cliente", json!(true)).await.unwrap();
    assert_eq!(engine.check_and_advance("v-1").await.unwrap(), 1);

    let process = engine.store().get("v-1").await.unwrap().unwrap();
    assert_eq!(process.current_state, "pedido");
    assert_eq!(process.previous_state.as_deref(), Some("orcamento"));

    let record = process.history.last().unwrap();
    assert_eq!(record.actor_type, ActorType::System);
    assert_eq!(record.actor, "system");
    assert!(!record.forced);
    assert!(record.justification.is_none());
    assert!(record.prerequisites_checked["field_check_0"].satisfied);
}

#[tokio::test]
async fn test_cascade_stops_before_final_state() {
    let (engine, _) = engine(vec![vendas()]);
    engine
        .create_process("vendas", Some("v-2".into()), flags(false, false))
        .await
        .unwrap();
    engine.set_field("v-2", "aprovado_cliente", json!(true)).await.unwrap();
    engine.set_field("v-2", "pagamento_recebido", json!(true)).await.unwrap();

    assert_eq!(engine.check_and_advance("v-2").await.unwrap(), 2);

    let process = engine.store().get("v-2").await.unwrap().unwrap();
    assert_eq!(process.current_state, "entrega");
    let path: Vec<_> = process.history.iter().map(|r| r.to_state.as_str()).collect();
    assert_eq!(path, ["pedido", "entrega"]);

    let again = engine.progress("v-2").await.unwrap();
    assert_eq!(again.steps_advanced, 0);
    assert_eq!(again.stop_reason, StopReason::FinalState);
}

#[tokio::test]
async fn test_agent_backward_move_requires_justification() {
    let (engine, _) = engine(vec![vendas()]);
    let created = engine
        .create_process("vendas", Some("v-3".into()), flags(true, true))
        .await
        .unwrap();
    assert_eq!(created.process.current_state, "entrega");
    let before = engine.store().get("v-3").await.unwrap().unwrap();

    let rejected = engine
        .execute(TransitionRequest::agent("v-3", "orcamento", "assistente", None))
        .await
        .unwrap_err();
    assert!(matches!(rejected, TransitionError::MissingJustification { .. }));
    assert!(rejected.is_rejection());
    assert_eq!(engine.store().get("v-3").await.unwrap().unwrap(), before);

    let outcome = engine
        .execute(
            TransitionRequest::agent("v-3", "orcamento", "assistente", Some("cliente pediu revisão".into()))
                .without_auto_progression(),
        )
        .await
        .unwrap();
    assert!(outcome.record.forced);
    assert_eq!(outcome.record.trigger, TRIGGER_AGENT);
    assert_eq!(outcome.record.justification.as_deref(), Some("cliente pediu revisão"));
    assert_eq!(outcome.process.current_state, "orcamento");
    assert!(outcome.cascade.is_none());
}

#[tokio::test]
async fn test_blank_agent_justification_counts_as_missing() {
    let (engine, _) = engine(vec![vendas()]);
    engine
        .create_process("vendas", Some("v-4".into()), flags(false, false))
        .await
        .unwrap();

    let err = engine
        .execute(TransitionRequest::agent("v-4", "entrega", "assistente", Some("   ".into())))
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::MissingJustification { actor_type: ActorType::Agent, .. }));
}

#[tokio::test]
async fn test_user_backward_move_without_justification_is_allowed() {
    let (engine, _) = engine(vec![vendas()]);
    engine
        .create_process("vendas", Some("v-5".into()), flags(true, false))
        .await
        .unwrap();

    let outcome = engine
        .execute(TransitionRequest::user("v-5", "orcamento", "ana").without_auto_progression())
        .await
        .unwrap();

    assert!(outcome.record.forced);
    assert!(outcome.record.justification.is_none());
    assert_eq!(outcome.record.actor_type, ActorType::User);
    assert_eq!(outcome.process.current_state, "orcamento");
}

#[tokio::test]
async fn test_user_justification_mandate_applies_to_forced_moves() {
    let mut config = KanbanEngineConfig::default();
    config.engine.require_user_justification = true;
    let (engine, _) = engine_with_config(vec![vendas()], config);
    engine
        .create_process("vendas", Some("v-6".into()), flags(false, false))
        .await
        .unwrap();

    let err = engine
        .execute(TransitionRequest::user("v-6", "entrega", "ana"))
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::MissingJustification { .. }));

    engine
        .execute(TransitionRequest::user("v-6", "entrega", "ana").with_justification("pagamento antecipado"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_forward_move_with_unmet_prerequisites_is_forced_with_advisories() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (builder, _) = builder(vec![vendas()]);
    let engine = builder.notifier(notifier.clone()).build().unwrap();
    engine
        .create_process("vendas", Some("v-7".into()), flags(false, false))
        .await
        .unwrap();

    let outcome = engine
        .execute(TransitionRequest::user("v-7", "entrega", "ana"))
        .await
        .unwrap();

    assert!(outcome.record.forced);
    assert_eq!(outcome.advisories.len(), 1);
    assert!(outcome.advisories[0].contains("pagamento_recebido"));
    assert!(!outcome.record.prerequisites_checked["field_check_0"].satisfied);

    let alerts = notifier.received();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].process_id, "v-7");
    assert!(alerts[0].forced);
}

#[tokio::test]
async fn test_system_moves_raise_no_alerts_and_drop_justification() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (builder, _) = builder(vec![vendas()]);
    let engine = builder.notifier(notifier.clone()).build().unwrap();
    engine
        .create_process("vendas", Some("v-8".into()), flags(true, true))
        .await
        .unwrap();

    let outcome = engine
        .execute(TransitionRequest::system("v-8", "orcamento").with_justification("ignored"))
        .await
        .unwrap();
    assert!(outcome.record.forced);
    assert!(outcome.record.justification.is_none());
    assert!(notifier.received().is_empty());
}

#[tokio::test]
async fn test_unknown_target_state_changes_nothing() {
    let (engine, _) = engine(vec![vendas()]);
    engine
        .create_process("vendas", Some("v-9".into()), flags(false, false))
        .await
        .unwrap();
    let before = engine.store().get("v-9").await.unwrap().unwrap();

    let err = engine
        .execute(TransitionRequest::user("v-9", "arquivado", "ana"))
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::InvalidState { ref state, .. } if state == "arquivado"));
    assert_eq!(engine.store().get("v-9").await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn test_transition_on_missing_process() {
    let (engine, _) = engine(vec![vendas()]);
    let err = engine
        .execute(TransitionRequest::user("nao-existe", "pedido", "ana"))
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::ProcessNotFound(ref id) if id == "nao-existe"));
}

#[tokio::test]
async fn test_user_transition_is_followed_by_cascade() {
    let (engine, _) = engine(vec![vendas()]);
    engine
        .create_process("vendas", Some("v-10".into()), flags(false, true))
        .await
        .unwrap();

    let outcome = engine
        .execute(TransitionRequest::user("v-10", "pedido", "ana").with_justification("aprovado por telefone"))
        .await
        .unwrap();

    assert!(outcome.record.forced);
    let cascade = outcome.cascade.unwrap();
    assert_eq!(cascade.steps_advanced, 1);
    assert_eq!(cascade.stop_reason, StopReason::FinalState);
    assert_eq!(outcome.process.current_state, "entrega");
}

#[tokio::test]
async fn test_compliance_over_ten_transitions_with_one_forced() {
    let suporte = WorkflowDefinition::new(
        "suporte",
        "aberto",
        vec![
            StateDefinition::new("aberto"),
            StateDefinition::new("triagem"),
            StateDefinition::new("atendimento"),
            StateDefinition::new("bloqueado").with_prerequisite(is_true("liberado")),
        ],
    )
    .with_flow_sequence(vec!["aberto".into()]);
    let (engine, _) = engine(vec![suporte]);
    engine
        .create_process("suporte", Some("s-1".into()), data(json!({})))
        .await
        .unwrap();

    let mut target = "triagem";
    for _ in 0..9 {
        engine
            .execute(TransitionRequest::user("s-1", target, "ana"))
            .await
            .unwrap();
        target = if target == "triagem" { "atendimento" } else { "triagem" };
    }
    engine
        .execute(TransitionRequest::user("s-1", "bloqueado", "ana"))
        .await
        .unwrap();

    let snapshot = engine.audit().compliance_score("suporte", TimeWindow::All).await.unwrap();
    assert_eq!(snapshot.total, 10);
    assert_eq!(snapshot.forced, 1);
    assert!((snapshot.score - 0.8).abs() < 1e-9);
}

#[tokio::test]
async fn test_declared_graph_does_not_block_moves() {
    let mut definition = vendas();
    definition.allowed_transitions = Some(
        [("orcamento".to_string(), vec!["pedido".to_string()])]
            .into_iter()
            .collect(),
    );
    let (engine, _) = engine(vec![definition]);
    engine
        .create_process("vendas", Some("v-11".into()), flags(false, false))
        .await
        .unwrap();

    let process = engine
        .transition(TransitionRequest::user("v-11", "cancelado", "ana"))
        .await
        .unwrap();
    assert_eq!(process.current_state, "cancelado");
    assert!(!process.history[0].forced);
}

struct FlagEveryAgent;

#[async_trait::async_trait]
impl kanban_engine::SignalCollaborator for FlagEveryAgent {
    async fn assess(
        &self,
        _process: &kanban_engine::ProcessInstance,
        record: &kanban_engine::TransitionRecord,
    ) -> anyhow::Result<kanban_engine::Signal> {
        Ok(kanban_engine::Signal {
            unusual: record.actor_type == ActorType::Agent,
            reason: Some("agent moves are being reviewed".into()),
        })
    }
}

#[tokio::test]
async fn test_signal_collaborator_adds_alert_to_clean_move() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (builder, _) = builder(vec![vendas()]);
    let engine = builder
        .notifier(notifier.clone())
        .signals(Arc::new(FlagEveryAgent))
        .build()
        .unwrap();
    engine
        .create_process("vendas", Some("v-12".into()), flags(false, false))
        .await
        .unwrap();

    let outcome = engine
        .execute(TransitionRequest::agent("v-12", "cancelado", "assistente", None))
        .await
        .unwrap();

    assert!(!outcome.record.forced);
    assert_eq!(outcome.alerts.len(), 1);
    assert!(outcome.alerts[0].contains("agent moves are being reviewed"));
    assert_eq!(notifier.received().len(), 1);
}
