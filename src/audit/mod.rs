// Audit trail: queries and compliance scoring over process histories,
// plus an optional append-only JSONL mirror.

pub mod compliance;
pub mod query;
pub mod storage;
pub mod trail;

pub use compliance::{
    compute, format_compliance_report, hours_before, ComplianceSettings, ComplianceSnapshot, TimeWindow,
    UnusualActivity,
};
pub use query::{AuditEntry, AuditQuery};
pub use storage::{AuditSink, JsonlAuditSink};
pub use trail::AuditTrail;
