use chrono::{DateTime, Utc};

use super::types::Evaluation;
use crate::definition::TimeReference;
use crate::process::ProcessInstance;

/// Resolve the reference timestamp by scanning the process history
pub fn reference_time(process: &ProcessInstance, reference: &TimeReference) -> Option<DateTime<Utc>> {
    match reference {
        TimeReference::Creation => Some(process.created_at),
        // no transitions yet: the process has been where it is since creation
        TimeReference::LastTransition => {
            Some(process.last_transition_at().unwrap_or(process.created_at))
        }
        TimeReference::StateEntry { state } => {
            // the initial state was entered at creation, whatever re-entries followed
            if initial_state(process) == state.as_str() {
                return Some(process.created_at);
            }
            process.first_entry_into(state)
        }
    }
}

fn initial_state(process: &ProcessInstance) -> &str {
    process
        .history
        .first()
        .map(|r| r.from_state.as_str())
        .unwrap_or(process.current_state.as_str())
}

pub fn evaluate(
    process: &ProcessInstance,
    reference: &TimeReference,
    min_hours: f64,
    max_hours: Option<f64>,
    now: DateTime<Utc>,
) -> Evaluation {
    let Some(since) = reference_time(process, reference) else {
        let state = match reference {
            TimeReference::StateEntry { state } => state.as_str(),
            _ => "reference",
        };
        return Evaluation::unsatisfied(format!("state '{state}' was never entered"));
    };

    let elapsed = (now - since).num_milliseconds() as f64 / 3_600_000.0;

    let alert = max_hours
        .filter(|max| elapsed > *max)
        .map(|max| format!("{elapsed:.1}h elapsed exceeds maximum of {max}h"));

    let evaluation = if elapsed >= min_hours {
        Evaluation::satisfied(format!("{elapsed:.1}h elapsed (minimum {min_hours}h)"))
    } else {
        Evaluation::unsatisfied(format!("{elapsed:.1}h elapsed, {min_hours}h required"))
    };
    evaluation.with_alert(alert)
}
