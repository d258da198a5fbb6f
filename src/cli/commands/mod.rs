use anyhow::Result;
use serde_json::Value;

use crate::progression::ProgressionReport;

pub mod advance;
pub mod audit;
pub mod compliance;
pub mod create;
pub mod set_field;
pub mod sweep;
pub mod transition;
pub mod validate;
pub mod watch;

/// Parse a CLI value as JSON, falling back to a plain string
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn print_progression(report: &ProgressionReport) {
    if report.steps_advanced == 0 {
        println!("⏸️  No automatic progress ({})", report.stop_reason);
    } else {
        println!(
            "⏩ Advanced {} step(s) automatically, stopped: {}",
            report.steps_advanced, report.stop_reason
        );
    }
}

pub async fn show_how_to_get_started() -> Result<()> {
    println!("🗂️  Kanban Engine - workflow transitions with audited prerequisites");
    println!();
    println!("To get started:");
    println!("  ✅ kanban-engine validate <file>          # Check a workflow definition");
    println!("  🆕 kanban-engine create -k <kanban>       # Start a process");
    println!("  ✏️  kanban-engine set-field <id> <path> <v> # Update process data");
    println!("  ➡️  kanban-engine transition <id> <state>  # Move a process");
    println!();
    println!("Operations:");
    println!("  ⏩ kanban-engine sweep -k <kanban>        # Advance every process once");
    println!("  👀 kanban-engine watch -k <kanban>        # Keep advancing until Ctrl-C");
    println!("  📜 kanban-engine audit                    # Browse the audit trail");
    println!("  📋 kanban-engine compliance -k <kanban>   # Score forced transitions");
    println!();
    println!("💡 Definitions live in .kanban/definitions/<kanban>.json or .toml");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_value_prefers_json() {
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_value("Ana Souza"), json!("Ana Souza"));
    }
}
