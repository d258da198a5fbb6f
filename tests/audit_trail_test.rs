//! Audit queries, compliance scoring and the JSONL mirror

mod common;

use chrono::{Duration, Utc};
use common::{engine, engine_with_config, flags, vendas};
use kanban_engine::audit::{AuditQuery, JsonlAuditSink, TimeWindow};
use kanban_engine::{ActorType, KanbanEngineConfig, TransitionRequest, WorkflowEngine};
use tempfile::TempDir;

async fn populate(engine: &WorkflowEngine) {
    engine
        .create_process("vendas", Some("p1".into()), flags(true, false))
        .await
        .unwrap();
    engine
        .execute(TransitionRequest::user("p1", "orcamento", "ana").without_auto_progression())
        .await
        .unwrap();
    engine
        .execute(
            TransitionRequest::agent("p1", "entrega", "robo", Some("pagamento confirmado por e-mail".into()))
                .without_auto_progression(),
        )
        .await
        .unwrap();
    engine
        .create_process("vendas", Some("p2".into()), flags(false, false))
        .await
        .unwrap();
    engine
        .execute(TransitionRequest::user("p2", "pedido", "joao").without_auto_progression())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_audit_queries() {
    let (engine, _) = engine(vec![vendas()]);
    populate(&engine).await;
    let audit = engine.audit();

    let p1 = audit.by_process("p1").await.unwrap();
    let sequences: Vec<usize> = p1.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, [0, 1, 2]);
    assert_eq!(p1[0].record.actor_type, ActorType::System);

    assert_eq!(audit.by_kanban("vendas").await.unwrap().len(), 4);
    assert!(audit.by_kanban("compras").await.unwrap().is_empty());

    let ana = audit.by_actor("ana").await.unwrap();
    assert_eq!(ana.len(), 1);
    assert_eq!(ana[0].record.to_state, "orcamento");

    let agents = audit
        .query(&AuditQuery::new().kanban("vendas").actor_type(ActorType::Agent))
        .await
        .unwrap();
    assert_eq!(agents.len(), 1);
    assert!(agents[0].record.justification.is_some());

    let forced = audit.query(&AuditQuery::new().forced_only()).await.unwrap();
    assert_eq!(forced.len(), 3);

    let recent = audit.most_recent(2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].process_id, "p2");
    assert_eq!(recent[1].record.actor, "robo");

    let now = Utc::now();
    assert_eq!(audit.in_range(now - Duration::hours(1), now + Duration::hours(1)).await.unwrap().len(), 4);
    assert!(audit.in_range(now + Duration::hours(1), now + Duration::hours(2)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_compliance_score_and_window() {
    let (engine, _) = engine(vec![vendas()]);
    populate(&engine).await;

    let snapshot = engine.audit().compliance_score("vendas", TimeWindow::All).await.unwrap();
    assert_eq!(snapshot.total, 4);
    assert_eq!(snapshot.forced, 3);
    assert_eq!(snapshot.score, 0.0);

    let recent = engine
        .audit()
        .compliance_score("vendas", TimeWindow::LastHours(1))
        .await
        .unwrap();
    assert_eq!(recent.total, 4);

    let later = engine
        .audit()
        .compliance_score_at("vendas", TimeWindow::LastHours(1), Utc::now() + Duration::hours(3))
        .await
        .unwrap();
    assert_eq!(later.total, 0);
    assert_eq!(later.score, 1.0);

    let everything = engine
        .audit()
        .compliance_score("vendas", TimeWindow::LastHours(10_000_000_000))
        .await
        .unwrap();
    assert_eq!(everything.total, 4);
    assert_eq!(everything.forced, 3);
}

#[tokio::test]
async fn test_compliance_flags_actor_with_most_forced_moves() {
    let (engine, _) = engine(vec![vendas()]);
    for i in 0..4 {
        let id = format!("p{i}");
        engine
            .create_process("vendas", Some(id.clone()), flags(false, false))
            .await
            .unwrap();
        let actor = if i < 3 { "ana" } else { "bia" };
        engine
            .execute(TransitionRequest::user(&id, "entrega", actor).without_auto_progression())
            .await
            .unwrap();
    }

    let snapshot = engine.audit().compliance_score("vendas", TimeWindow::All).await.unwrap();
    assert_eq!(snapshot.unusual_activity.len(), 1);
    let flagged = &snapshot.unusual_activity[0];
    assert_eq!(flagged.actor, "ana");
    assert_eq!(flagged.forced_count, 3);
    assert!((flagged.share - 0.75).abs() < 1e-9);
}

#[tokio::test]
async fn test_jsonl_mirror_configured_by_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit").join("trail.jsonl");
    let mut config = KanbanEngineConfig::default();
    config.audit.jsonl_path = Some(path.to_string_lossy().into_owned());
    let (engine, _) = engine_with_config(vec![vendas()], config);
    populate(&engine).await;

    let mirrored = JsonlAuditSink::new(&path).load_entries().await.unwrap();
    let queried = engine.audit().by_kanban("vendas").await.unwrap();
    assert_eq!(mirrored.len(), queried.len());

    let mut mirrored_keys: Vec<(String, usize)> =
        mirrored.iter().map(|e| (e.process_id.clone(), e.sequence)).collect();
    let mut queried_keys: Vec<(String, usize)> = queried.iter().map(|e| (e.process_id.clone(), e.sequence)).collect();
    mirrored_keys.sort();
    queried_keys.sort();
    assert_eq!(mirrored_keys, queried_keys);
}
