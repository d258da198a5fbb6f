use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::process::{ActorType, ProcessInstance, TransitionRecord};

/// A transition record together with where it lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub process_id: String,
    pub kanban_id: String,
    /// Index of the record in the process history
    pub sequence: usize,
    pub record: TransitionRecord,
}

impl AuditEntry {
    pub fn from_process(process: &ProcessInstance) -> impl Iterator<Item = AuditEntry> + '_ {
        process
            .history
            .iter()
            .enumerate()
            .map(|(sequence, record)| AuditEntry {
                process_id: process.process_id.clone(),
                kanban_id: process.kanban_id.clone(),
                sequence,
                record: record.clone(),
            })
    }
}

/// Filters over the audit trail. Empty query matches everything.
/// `since` is inclusive and `until` exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditQuery {
    pub process_id: Option<String>,
    pub kanban_id: Option<String>,
    pub actor: Option<String>,
    pub actor_type: Option<ActorType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub forced_only: bool,
    /// Keep only the last N matching entries
    pub latest: Option<usize>,
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(mut self, process_id: impl Into<String>) -> Self {
        self.process_id = Some(process_id.into());
        self
    }

    pub fn kanban(mut self, kanban_id: impl Into<String>) -> Self {
        self.kanban_id = Some(kanban_id.into());
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn actor_type(mut self, actor_type: ActorType) -> Self {
        self.actor_type = Some(actor_type);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn forced_only(mut self) -> Self {
        self.forced_only = true;
        self
    }

    pub fn latest(mut self, n: usize) -> Self {
        self.latest = Some(n);
        self
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        let record = &entry.record;
        self.process_id.as_ref().is_none_or(|id| *id == entry.process_id)
            && self.kanban_id.as_ref().is_none_or(|id| *id == entry.kanban_id)
            && self.actor.as_ref().is_none_or(|a| *a == record.actor)
            && self.actor_type.is_none_or(|t| t == record.actor_type)
            && self.since.is_none_or(|s| record.timestamp >= s)
            && self.until.is_none_or(|u| record.timestamp < u)
            && (!self.forced_only || record.forced)
    }

    /// Filter and order chronologically, then apply `latest`
    pub fn apply(&self, entries: impl IntoIterator<Item = AuditEntry>) -> Vec<AuditEntry> {
        let mut selected: Vec<AuditEntry> = entries.into_iter().filter(|e| self.matches(e)).collect();
        selected.sort_by(|a, b| {
            a.record
                .timestamp
                .cmp(&b.record.timestamp)
                .then_with(|| a.process_id.cmp(&b.process_id))
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
        if let Some(n) = self.latest {
            let skip = selected.len().saturating_sub(n);
            selected.drain(..skip);
        }
        selected
    }
}
