//! Drives the kanban-engine binary against a scratch workspace

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const VENDAS: &str = r#"{
  "kanban_id": "vendas",
  "name": "Vendas",
  "initial_state": "orcamento",
  "states": [
    {"id": "orcamento"},
    {"id": "pedido", "prerequisites": [
      {"type": "field_check", "field": "aprovado_cliente", "operator": "is_true", "message": "Cliente aprovou"}
    ]},
    {"id": "entrega", "prerequisites": [
      {"type": "field_check", "field": "pagamento_recebido", "operator": "is_true", "message": "Pagamento recebido"}
    ]},
    {"id": "concluido", "is_final": true}
  ]
}"#;

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let definitions = dir.path().join(".kanban").join("definitions");
    fs::create_dir_all(&definitions).unwrap();
    fs::write(definitions.join("vendas.json"), VENDAS).unwrap();
    dir
}

fn kanban(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kanban-engine").unwrap();
    cmd.current_dir(dir).env("RUST_LOG", "error");
    cmd
}

#[test]
fn test_no_subcommand_shows_getting_started() {
    let dir = TempDir::new().unwrap();
    kanban(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Kanban Engine"))
        .stdout(predicate::str::contains("kanban-engine validate"));
}

#[test]
fn test_validate_reports_good_and_bad_definitions() {
    let dir = workspace();
    let good = dir.path().join(".kanban/definitions/vendas.json");
    kanban(dir.path())
        .arg("validate")
        .arg(&good)
        .assert()
        .success()
        .stdout(predicate::str::contains("✅"))
        .stdout(predicate::str::contains("orcamento → pedido → entrega → concluido"));

    let bad = dir.path().join("quebrado.json");
    fs::write(&bad, r#"{"kanban_id": "quebrado", "initial_state": "x", "states": [{"id": "a"}]}"#).unwrap();
    kanban(dir.path())
        .arg("validate")
        .arg(&bad)
        .assert()
        .failure()
        .stdout(predicate::str::contains("❌"))
        .stdout(predicate::str::contains("initial_state"));
}

#[test]
fn test_process_lifecycle_through_cli() {
    let dir = workspace();

    kanban(dir.path())
        .args(["create", "-k", "vendas", "--id", "v-1", "--data", r#"{"aprovado_cliente": true}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created process v-1"))
        .stdout(predicate::str::contains("Advanced 1 step"));

    kanban(dir.path())
        .args(["transition", "v-1", "orcamento", "--actor", "robo", "--actor-type", "agent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("justification"));

    kanban(dir.path())
        .args([
            "transition", "v-1", "orcamento", "--actor", "robo", "--actor-type", "agent", "-j", "retrabalho",
            "--no-cascade",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Recorded as forced"))
        .stdout(predicate::str::contains("Current state: orcamento"));

    let output = kanban(dir.path())
        .args(["audit", "--process", "v-1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let lines: Vec<serde_json::Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1]["record"]["justification"], "retrabalho");

    kanban(dir.path())
        .args(["compliance", "-k", "vendas", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Transitions: 2"))
        .stdout(predicate::str::contains("Score: 0.00"));

    kanban(dir.path())
        .args(["set-field", "v-1", "pagamento_recebido", "true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Advanced 2 step(s)"));

    assert!(dir.path().join(".kanban/processes.json").exists());
}

#[test]
fn test_sweep_advances_waiting_processes() {
    let dir = workspace();
    kanban(dir.path())
        .args(["create", "-k", "vendas", "--id", "v-2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No automatic progress"));
    kanban(dir.path())
        .args(["set-field", "v-2", "aprovado_cliente", "true", "--no-advance"])
        .assert()
        .success();

    kanban(dir.path())
        .args(["sweep", "-k", "vendas"])
        .assert()
        .success()
        .stdout(predicate::str::contains("examined 1 process(es), advanced 1 by 1 step(s)"));
}

#[test]
fn test_unknown_kanban_fails() {
    let dir = workspace();
    kanban(dir.path())
        .args(["create", "-k", "compras"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("compras"));
}

#[test]
fn test_watch_releases_workspace_between_passes() {
    let dir = workspace();
    kanban(dir.path())
        .args(["create", "-k", "vendas", "--id", "v-3"])
        .assert()
        .success();

    let watcher = std::process::Command::new(assert_cmd::cargo::cargo_bin("kanban-engine"))
        .current_dir(dir.path())
        .env("RUST_LOG", "error")
        .args(["watch", "-k", "vendas", "--interval", "2", "--passes", "2"])
        .stdout(std::process::Stdio::piped())
        .spawn()
        .unwrap();

    std::thread::sleep(std::time::Duration::from_millis(500));
    let mut updated = false;
    for _ in 0..10 {
        let output = kanban(dir.path())
            .args(["set-field", "v-3", "aprovado_cliente", "true", "--no-advance"])
            .output()
            .unwrap();
        if output.status.success() {
            updated = true;
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    assert!(updated, "set-field never got the workspace while watch was running");

    let output = watcher.wait_with_output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Stopped after 2 sweep(s)"), "{stdout}");
    assert!(stdout.contains("advanced 1 by 1 step(s)"), "{stdout}");

    let output = kanban(dir.path())
        .args(["audit", "--process", "v-3", "--json"])
        .output()
        .unwrap();
    let record: serde_json::Value = serde_json::from_str(String::from_utf8(output.stdout).unwrap().trim()).unwrap();
    assert_eq!(record["record"]["to_state"], "pedido");
    assert_eq!(record["record"]["actor_type"], "system");
}
