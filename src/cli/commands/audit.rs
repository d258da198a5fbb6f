use anyhow::{anyhow, Result};
use chrono::Utc;

use crate::audit::{hours_before, AuditEntry, AuditQuery};
use crate::cli::workspace::Workspace;
use crate::process::ActorType;

#[derive(Default)]
pub struct AuditCommand {
    pub process_id: Option<String>,
    pub kanban_id: Option<String>,
    pub actor: Option<String>,
    pub actor_type: Option<String>,
    pub forced_only: bool,
    pub since_hours: Option<u64>,
    pub limit: Option<usize>,
    pub json: bool,
}

impl AuditCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> Result<AuditQuery> {
        let mut query = AuditQuery::new();
        if let Some(process_id) = &self.process_id {
            query = query.process(process_id);
        }
        if let Some(kanban_id) = &self.kanban_id {
            query = query.kanban(kanban_id);
        }
        if let Some(actor) = &self.actor {
            query = query.actor(actor);
        }
        if let Some(actor_type) = &self.actor_type {
            let actor_type: ActorType = actor_type.parse().map_err(|e: String| anyhow!(e))?;
            query = query.actor_type(actor_type);
        }
        if self.forced_only {
            query = query.forced_only();
        }
        // a window reaching past the calendar range has no lower bound
        if let Some(since) = self.since_hours.and_then(|hours| hours_before(Utc::now(), hours)) {
            query = query.since(since);
        }
        if let Some(limit) = self.limit {
            query = query.latest(limit);
        }
        Ok(query)
    }

    pub async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let query = self.query()?;

        workspace
            .run(|engine| async move {
                let mut entries = engine.audit().query(&query).await?;
                if self.limit.is_some() {
                    entries.reverse();
                }

                if self.json {
                    for entry in &entries {
                        println!("{}", serde_json::to_string(entry)?);
                    }
                    return Ok(());
                }

                if entries.is_empty() {
                    println!("📜 No audit records match");
                    return Ok(());
                }
                println!("📜 {} audit record(s)", entries.len());
                for entry in &entries {
                    print_entry(entry);
                }
                Ok(())
            })
            .await
    }
}

fn print_entry(entry: &AuditEntry) {
    let record = &entry.record;
    let flag = if record.forced { "⚠️ " } else { "  " };
    println!(
        "{flag} {} {}#{} {} → {} by {} ({}, {})",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.process_id,
        entry.sequence,
        record.from_state,
        record.to_state,
        record.actor,
        record.actor_type,
        record.trigger
    );
    if let Some(justification) = &record.justification {
        println!("      Justification: {justification}");
    }
}
