use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::compliance::{compute, ComplianceSettings, ComplianceSnapshot, TimeWindow};
use super::query::{AuditEntry, AuditQuery};
use crate::process::{ProcessFilter, ProcessStore, StoreError};

/// Read side of the audit trail, served from process histories
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn ProcessStore>,
    settings: ComplianceSettings,
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("settings", &self.settings)
            .finish()
    }
}

impl AuditTrail {
    pub fn new(store: Arc<dyn ProcessStore>) -> Self {
        Self {
            store,
            settings: ComplianceSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ComplianceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError> {
        let processes = match &query.process_id {
            Some(id) => self.store.get(id).await?.into_iter().collect(),
            None => {
                let filter = ProcessFilter {
                    kanban_id: query.kanban_id.clone(),
                    current_state: None,
                };
                self.store.find(&filter).await?
            }
        };

        let entries = processes
            .iter()
            .flat_map(AuditEntry::from_process)
            .collect::<Vec<_>>();
        Ok(query.apply(entries))
    }

    pub async fn by_process(&self, process_id: &str) -> Result<Vec<AuditEntry>, StoreError> {
        self.query(&AuditQuery::new().process(process_id)).await
    }

    pub async fn by_kanban(&self, kanban_id: &str) -> Result<Vec<AuditEntry>, StoreError> {
        self.query(&AuditQuery::new().kanban(kanban_id)).await
    }

    pub async fn by_actor(&self, actor: &str) -> Result<Vec<AuditEntry>, StoreError> {
        self.query(&AuditQuery::new().actor(actor)).await
    }

    pub async fn in_range(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        self.query(&AuditQuery::new().since(since).until(until)).await
    }

    /// Newest first
    pub async fn most_recent(&self, n: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let mut entries = self.query(&AuditQuery::new().latest(n)).await?;
        entries.reverse();
        Ok(entries)
    }

    pub async fn compliance_score(
        &self,
        kanban_id: &str,
        window: TimeWindow,
    ) -> Result<ComplianceSnapshot, StoreError> {
        self.compliance_score_at(kanban_id, window, Utc::now()).await
    }

    pub async fn compliance_score_at(
        &self,
        kanban_id: &str,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Result<ComplianceSnapshot, StoreError> {
        let (since, until) = window.bounds(now);
        let query = AuditQuery {
            kanban_id: Some(kanban_id.to_string()),
            since,
            until,
            ..AuditQuery::default()
        };
        let entries = self.query(&query).await?;
        Ok(compute(kanban_id, window, &entries, &self.settings))
    }
}
