use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::prerequisite::PrerequisiteSpec;

pub const DEFAULT_MAX_CASCADE_DEPTH: u32 = 3;

/// Immutable description of a process template (a "kanban")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub kanban_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub states: Vec<StateDefinition>,
    /// Canonical forward order; declaration order of `states` when empty
    #[serde(default)]
    pub flow_sequence: Vec<String>,
    pub initial_state: String,
    #[serde(default)]
    pub max_cascade_depth: Option<u32>,
    /// Declared transition graph. Informational only: moves outside it are logged, not forced.
    #[serde(default)]
    pub allowed_transitions: Option<BTreeMap<String, Vec<String>>>,
    /// Let auto-progression land on a final state
    #[serde(default)]
    pub auto_enter_final: bool,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub prerequisites: Vec<PrerequisiteSpec>,
}

impl StateDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            is_final: false,
            prerequisites: Vec::new(),
        }
    }

    pub fn final_state(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn with_prerequisite(mut self, prerequisite: PrerequisiteSpec) -> Self {
        self.prerequisites.push(prerequisite);
        self
    }
}

impl WorkflowDefinition {
    pub fn new(
        kanban_id: impl Into<String>,
        initial_state: impl Into<String>,
        states: Vec<StateDefinition>,
    ) -> Self {
        let kanban_id = kanban_id.into();
        Self {
            name: kanban_id.clone(),
            kanban_id,
            version: 1,
            states,
            flow_sequence: Vec::new(),
            initial_state: initial_state.into(),
            max_cascade_depth: None,
            allowed_transitions: None,
            auto_enter_final: false,
        }
    }

    pub fn with_flow_sequence(mut self, sequence: Vec<String>) -> Self {
        self.flow_sequence = sequence;
        self
    }

    pub fn with_max_cascade_depth(mut self, depth: u32) -> Self {
        self.max_cascade_depth = Some(depth);
        self
    }

    /// Fill in derived defaults after deserialization
    pub fn normalized(mut self) -> Self {
        if self.flow_sequence.is_empty() {
            self.flow_sequence = self.states.iter().map(|s| s.id.clone()).collect();
        }
        for state in &mut self.states {
            if state.name.is_empty() {
                state.name = state.id.clone();
            }
        }
        self
    }

    pub fn state(&self, id: &str) -> Option<&StateDefinition> {
        self.states.iter().find(|s| s.id == id)
    }

    pub fn has_state(&self, id: &str) -> bool {
        self.state(id).is_some()
    }

    pub fn is_final(&self, id: &str) -> bool {
        self.state(id).map(|s| s.is_final).unwrap_or(false)
    }

    /// Position in the flow sequence; `None` for states outside it
    pub fn position(&self, id: &str) -> Option<usize> {
        self.flow_sequence.iter().position(|s| s == id)
    }

    /// Backward only when both states are in the sequence and `to` precedes `from`
    pub fn is_backward(&self, from: &str, to: &str) -> bool {
        match (self.position(from), self.position(to)) {
            (Some(from_pos), Some(to_pos)) => to_pos < from_pos,
            _ => false,
        }
    }

    pub fn next_in_flow(&self, id: &str) -> Option<&StateDefinition> {
        let pos = self.position(id)?;
        let next_id = self.flow_sequence.get(pos + 1)?;
        self.state(next_id)
    }

    pub fn cascade_depth(&self, fallback: u32) -> u32 {
        self.max_cascade_depth.unwrap_or(fallback)
    }

    /// True when no graph is declared or the graph lists this move
    pub fn declares_transition(&self, from: &str, to: &str) -> bool {
        match &self.allowed_transitions {
            None => true,
            Some(graph) => graph
                .get(from)
                .map(|targets| targets.iter().any(|t| t == to))
                .unwrap_or(false),
        }
    }

    pub fn final_states(&self) -> Vec<&str> {
        self.states
            .iter()
            .filter(|s| s.is_final)
            .map(|s| s.id.as_str())
            .collect()
    }
}
