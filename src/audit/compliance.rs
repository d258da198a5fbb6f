use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::query::AuditEntry;
use crate::process::ActorType;

/// Time span a compliance score covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    All,
    LastHours(u64),
    Between {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl TimeWindow {
    /// `(since, until)` relative to `now`; `since` inclusive, `until` exclusive
    pub fn bounds(&self, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match *self {
            TimeWindow::All => (None, None),
            TimeWindow::LastHours(hours) => (hours_before(now, hours), None),
            TimeWindow::Between { start, end } => (Some(start), Some(end)),
        }
    }
}

/// `now - hours`, or `None` when that reaches past the representable range
pub fn hours_before(now: DateTime<Utc>, hours: u64) -> Option<DateTime<Utc>> {
    let delta = i64::try_from(hours).ok().and_then(TimeDelta::try_hours)?;
    now.checked_sub_signed(delta)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplianceSettings {
    /// Share of all forced transitions above which one actor is flagged
    pub unusual_forced_share: f64,
    /// Minimum forced transitions before an actor can be flagged
    pub unusual_min_forced: usize,
}

impl Default for ComplianceSettings {
    fn default() -> Self {
        Self {
            unusual_forced_share: 0.5,
            unusual_min_forced: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnusualActivity {
    pub actor: String,
    pub actor_type: ActorType,
    pub forced_count: usize,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSnapshot {
    pub kanban_id: String,
    pub window: TimeWindow,
    pub total: usize,
    pub forced: usize,
    pub forced_ratio: f64,
    pub score: f64,
    pub unusual_activity: Vec<UnusualActivity>,
}

/// Score a set of entries already restricted to the window
pub fn compute(
    kanban_id: &str,
    window: TimeWindow,
    entries: &[AuditEntry],
    settings: &ComplianceSettings,
) -> ComplianceSnapshot {
    let total = entries.len();
    let forced_entries: Vec<&AuditEntry> = entries.iter().filter(|e| e.record.forced).collect();
    let forced = forced_entries.len();

    let forced_ratio = if total == 0 {
        0.0
    } else {
        forced as f64 / total as f64
    };
    let score = (1.0 - 2.0 * forced_ratio).max(0.0);

    let mut by_actor: BTreeMap<&str, (ActorType, usize)> = BTreeMap::new();
    for entry in &forced_entries {
        by_actor
            .entry(entry.record.actor.as_str())
            .or_insert((entry.record.actor_type, 0))
            .1 += 1;
    }

    let mut unusual_activity: Vec<UnusualActivity> = by_actor
        .into_iter()
        .filter_map(|(actor, (actor_type, count))| {
            let share = count as f64 / forced as f64;
            (count >= settings.unusual_min_forced && share > settings.unusual_forced_share).then(|| {
                UnusualActivity {
                    actor: actor.to_string(),
                    actor_type,
                    forced_count: count,
                    share,
                }
            })
        })
        .collect();
    unusual_activity.sort_by(|a, b| b.forced_count.cmp(&a.forced_count));

    ComplianceSnapshot {
        kanban_id: kanban_id.to_string(),
        window,
        total,
        forced,
        forced_ratio,
        score,
        unusual_activity,
    }
}

/// Plain-text summary for the CLI
pub fn format_compliance_report(snapshot: &ComplianceSnapshot) -> String {
    let mut output = String::new();

    output.push_str(&format!("📋 Compliance report: {}\n", snapshot.kanban_id));
    output.push_str("═══════════════════════════════\n\n");

    let window = match snapshot.window {
        TimeWindow::All => "all time".to_string(),
        TimeWindow::LastHours(h) => format!("last {h} hours"),
        TimeWindow::Between { start, end } => format!("{} to {}", start.to_rfc3339(), end.to_rfc3339()),
    };
    output.push_str(&format!("🕒 Window: {window}\n"));
    output.push_str(&format!("🔁 Transitions: {}\n", snapshot.total));
    output.push_str(&format!(
        "⚠️  Forced: {} ({:.1}%)\n",
        snapshot.forced,
        snapshot.forced_ratio * 100.0
    ));

    let badge = if snapshot.score >= 0.8 {
        "✅"
    } else if snapshot.score >= 0.5 {
        "🟡"
    } else {
        "🔴"
    };
    output.push_str(&format!("{badge} Score: {:.2}\n", snapshot.score));

    if !snapshot.unusual_activity.is_empty() {
        output.push_str("\n🚨 Unusual activity:\n");
        for activity in &snapshot.unusual_activity {
            output.push_str(&format!(
                "   • {} ({}): {} forced transitions, {:.0}% of all forced\n",
                activity.actor,
                activity.actor_type,
                activity.forced_count,
                activity.share * 100.0
            ));
        }
    }

    output
}
