use anyhow::{anyhow, Result};

use super::print_progression;
use crate::cli::workspace::Workspace;
use crate::process::ActorType;
use crate::transition::TransitionRequest;

pub struct TransitionCommand {
    pub process_id: String,
    pub to_state: String,
    pub actor: String,
    pub actor_type: String,
    pub justification: Option<String>,
    pub trigger: Option<String>,
    pub cascade: bool,
}

impl TransitionCommand {
    pub fn new(process_id: String, to_state: String, actor: String, actor_type: String) -> Self {
        Self {
            process_id,
            to_state,
            actor,
            actor_type,
            justification: None,
            trigger: None,
            cascade: true,
        }
    }

    pub fn with_justification(mut self, justification: Option<String>) -> Self {
        self.justification = justification;
        self
    }

    pub fn with_trigger(mut self, trigger: Option<String>) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_cascade(mut self, cascade: bool) -> Self {
        self.cascade = cascade;
        self
    }

    fn request(&self) -> Result<TransitionRequest> {
        let actor_type: ActorType = self.actor_type.parse().map_err(|e: String| anyhow!(e))?;
        let mut request = match actor_type {
            ActorType::User => TransitionRequest::user(&self.process_id, &self.to_state, &self.actor),
            ActorType::Agent => {
                TransitionRequest::agent(&self.process_id, &self.to_state, &self.actor, None)
            }
            ActorType::System => TransitionRequest::system(&self.process_id, &self.to_state),
        };
        request.justification = self.justification.clone();
        if let Some(trigger) = &self.trigger {
            request = request.with_trigger(trigger);
        }
        if !self.cascade {
            request = request.without_auto_progression();
        }
        Ok(request)
    }

    pub async fn execute(&self, workspace: &Workspace) -> Result<()> {
        let request = self.request()?;

        workspace
            .run(|engine| async move {
                let outcome = engine.execute(request).await?;
                let record = &outcome.record;

                let marker = if record.forced { "⚠️ " } else { "✅" };
                println!(
                    "{marker} {}: {} → {} by {} ({})",
                    outcome.process.process_id, record.from_state, record.to_state, record.actor, record.actor_type
                );
                if record.forced {
                    println!("   Recorded as forced");
                }
                if let Some(justification) = &record.justification {
                    println!("   Justification: {justification}");
                }
                for advisory in &outcome.advisories {
                    println!("   📝 {advisory}");
                }
                for alert in &outcome.alerts {
                    println!("   🚨 {alert}");
                }
                if let Some(cascade) = &outcome.cascade {
                    print_progression(cascade);
                }
                println!("   Current state: {}", outcome.process.current_state);
                Ok(())
            })
            .await
    }
}
