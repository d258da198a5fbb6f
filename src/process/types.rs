use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::prerequisites::PrerequisiteResult;

/// Who asked for a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    User,
    System,
    Agent,
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActorType::User => "user",
            ActorType::System => "system",
            ActorType::Agent => "agent",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ActorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(ActorType::User),
            "system" => Ok(ActorType::System),
            "agent" => Ok(ActorType::Agent),
            other => Err(format!("unknown actor type '{other}' (expected user, system or agent)")),
        }
    }
}

/// Immutable audit entry. Appended to a process history, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub timestamp: DateTime<Utc>,
    pub from_state: String,
    pub to_state: String,
    pub actor: String,
    pub actor_type: ActorType,
    pub trigger: String,
    pub forced: bool,
    pub justification: Option<String>,
    #[serde(default)]
    pub prerequisites_checked: BTreeMap<String, PrerequisiteResult>,
}

/// One running occurrence of a workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstance {
    pub process_id: String,
    pub kanban_id: String,
    pub current_state: String,
    pub previous_state: Option<String>,
    #[serde(default)]
    pub process_data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<TransitionRecord>,
    /// Optimistic concurrency token, bumped by every save
    #[serde(default)]
    pub version: u64,
}

impl ProcessInstance {
    pub fn new(
        process_id: impl Into<String>,
        kanban_id: impl Into<String>,
        initial_state: impl Into<String>,
        process_data: Map<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            process_id: process_id.into(),
            kanban_id: kanban_id.into(),
            current_state: initial_state.into(),
            previous_state: None,
            process_data,
            created_at: now,
            updated_at: now,
            history: Vec::new(),
            version: 0,
        }
    }

    /// Read a dotted path from `process_data`
    pub fn field(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.process_data, path)
    }

    /// Write a dotted path into `process_data`, creating intermediate objects.
    /// Non-object values along the path are replaced.
    pub fn set_field(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            return;
        };

        let mut current = &mut self.process_data;
        for segment in parents {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = match entry {
                Value::Object(map) => map,
                _ => unreachable!("entry was just made an object"),
            };
        }
        current.insert(last.to_string(), value);
    }

    /// Timestamp of the first transition into `state`
    pub fn first_entry_into(&self, state: &str) -> Option<DateTime<Utc>> {
        self.history
            .iter()
            .find(|r| r.to_state == state)
            .map(|r| r.timestamp)
    }

    pub fn last_transition_at(&self) -> Option<DateTime<Utc>> {
        self.history.last().map(|r| r.timestamp)
    }

    pub fn forced_transitions(&self) -> usize {
        self.history.iter().filter(|r| r.forced).count()
    }
}

/// Resolve a dotted path (`a.b.0.c`) against a JSON object.
/// Numeric segments index into arrays.
pub fn lookup_path<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.').filter(|s| !s.is_empty());
    let first = segments.next()?;
    let mut current = root.get(first)?;
    for segment in segments {
        current = lookup_value(current, segment)?;
    }
    Some(current)
}

/// Same as `lookup_path` but starting from any JSON value
pub fn lookup_value_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = lookup_value(current, segment)?;
    }
    Some(current)
}

fn lookup_value<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}
