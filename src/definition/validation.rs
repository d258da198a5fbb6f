// Structural checks run before a definition is accepted into the registry

use serde::Serialize;
use std::collections::HashSet;

use super::prerequisite::PrerequisiteCheck;
use super::types::WorkflowDefinition;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub location: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Validate a normalized definition. An empty result means the definition is usable.
pub fn validate(definition: &WorkflowDefinition) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if definition.kanban_id.trim().is_empty() {
        issues.push(ValidationIssue::new("kanban_id", "must not be empty"));
    }

    if definition.states.is_empty() {
        issues.push(ValidationIssue::new("states", "at least one state is required"));
    }

    let mut seen = HashSet::new();
    for state in &definition.states {
        if state.id.trim().is_empty() {
            issues.push(ValidationIssue::new("states", "state id must not be empty"));
        }
        if !seen.insert(state.id.as_str()) {
            issues.push(ValidationIssue::new(
                format!("states.{}", state.id),
                "duplicate state id",
            ));
        }
    }

    if !definition.has_state(&definition.initial_state) {
        issues.push(ValidationIssue::new(
            "initial_state",
            format!("unknown state '{}'", definition.initial_state),
        ));
    }

    let mut in_flow = HashSet::new();
    for id in &definition.flow_sequence {
        if !definition.has_state(id) {
            issues.push(ValidationIssue::new(
                "flow_sequence",
                format!("unknown state '{id}'"),
            ));
        }
        if !in_flow.insert(id.as_str()) {
            issues.push(ValidationIssue::new(
                "flow_sequence",
                format!("state '{id}' appears more than once"),
            ));
        }
    }

    if definition.max_cascade_depth == Some(0) {
        issues.push(ValidationIssue::new(
            "max_cascade_depth",
            "must be at least 1",
        ));
    }

    if let Some(graph) = &definition.allowed_transitions {
        for (from, targets) in graph {
            if !definition.has_state(from) {
                issues.push(ValidationIssue::new(
                    "allowed_transitions",
                    format!("unknown source state '{from}'"),
                ));
            }
            for to in targets {
                if !definition.has_state(to) {
                    issues.push(ValidationIssue::new(
                        format!("allowed_transitions.{from}"),
                        format!("unknown target state '{to}'"),
                    ));
                }
            }
        }
    }

    for state in &definition.states {
        let mut prerequisite_ids = HashSet::new();
        for (index, spec) in state.prerequisites.iter().enumerate() {
            let id = spec.effective_id(index);
            let location = format!("states.{}.prerequisites.{}", state.id, id);
            if !prerequisite_ids.insert(id.clone()) {
                issues.push(ValidationIssue::new(&location, "duplicate prerequisite id"));
            }

            match &spec.check {
                PrerequisiteCheck::FieldCheck { field, .. } if field.trim().is_empty() => {
                    issues.push(ValidationIssue::new(&location, "field must not be empty"));
                }
                PrerequisiteCheck::ExternalApi {
                    endpoint,
                    timeout_secs,
                    ..
                } => {
                    if endpoint.trim().is_empty() {
                        issues.push(ValidationIssue::new(&location, "endpoint must not be empty"));
                    }
                    if *timeout_secs == 0 {
                        issues.push(ValidationIssue::new(&location, "timeout must be positive"));
                    }
                }
                PrerequisiteCheck::TimeElapsed {
                    min_hours,
                    max_hours,
                    ..
                } => {
                    if *min_hours < 0.0 {
                        issues.push(ValidationIssue::new(&location, "min_hours must not be negative"));
                    }
                    if let Some(max) = max_hours {
                        if max < min_hours {
                            issues.push(ValidationIssue::new(
                                &location,
                                "max_hours must not be below min_hours",
                            ));
                        }
                    }
                }
                PrerequisiteCheck::CustomScript {
                    handler,
                    timeout_secs,
                    ..
                } => {
                    if handler.trim().is_empty() {
                        issues.push(ValidationIssue::new(&location, "handler must not be empty"));
                    }
                    if *timeout_secs == 0 {
                        issues.push(ValidationIssue::new(&location, "timeout must be positive"));
                    }
                }
                _ => {}
            }
        }
    }

    issues
}
