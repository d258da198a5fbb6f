// Prerequisite declarations attached to workflow states.
// These are pure data; evaluation lives in crate::prerequisites.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_PREREQUISITE_TIMEOUT_SECS: u64 = 5;

/// A single informational (never blocking) condition on a state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrerequisiteSpec {
    /// Stable identifier used as the key in transition records
    #[serde(default)]
    pub id: Option<String>,
    /// Human-readable message shown when the prerequisite is not met
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub check: PrerequisiteCheck,
}

impl PrerequisiteSpec {
    pub fn new(check: PrerequisiteCheck, message: impl Into<String>) -> Self {
        Self {
            id: None,
            message: message.into(),
            check,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Explicit id, or `<kind>_<index>` for anonymous prerequisites
    pub fn effective_id(&self, index: usize) -> String {
        match &self.id {
            Some(id) if !id.trim().is_empty() => id.clone(),
            _ => format!("{}_{}", self.check.kind(), index),
        }
    }
}

/// The closed set of prerequisite kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrerequisiteCheck {
    FieldCheck {
        /// Dotted path into `process_data`
        field: String,
        operator: ComparisonOperator,
        #[serde(default)]
        value: Value,
    },
    ExternalApi {
        endpoint: String,
        #[serde(default)]
        method: ApiMethod,
        /// Payload template, see crate::prerequisites::template
        #[serde(default)]
        payload: Value,
        #[serde(default)]
        expected: ExpectedResponse,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    TimeElapsed {
        reference: TimeReference,
        min_hours: f64,
        #[serde(default)]
        max_hours: Option<f64>,
    },
    CustomScript {
        /// Name of a pre-registered handler
        handler: String,
        #[serde(default)]
        input: Value,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_timeout_secs() -> u64 {
    DEFAULT_PREREQUISITE_TIMEOUT_SECS
}

impl PrerequisiteCheck {
    pub fn kind(&self) -> PrerequisiteKind {
        match self {
            PrerequisiteCheck::FieldCheck { .. } => PrerequisiteKind::FieldCheck,
            PrerequisiteCheck::ExternalApi { .. } => PrerequisiteKind::ExternalApi,
            PrerequisiteCheck::TimeElapsed { .. } => PrerequisiteKind::TimeElapsed,
            PrerequisiteCheck::CustomScript { .. } => PrerequisiteKind::CustomScript,
        }
    }

    pub fn field_check(field: impl Into<String>, operator: ComparisonOperator, value: Value) -> Self {
        PrerequisiteCheck::FieldCheck {
            field: field.into(),
            operator,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrerequisiteKind {
    FieldCheck,
    ExternalApi,
    TimeElapsed,
    CustomScript,
}

impl std::fmt::Display for PrerequisiteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PrerequisiteKind::FieldCheck => "field_check",
            PrerequisiteKind::ExternalApi => "external_api",
            PrerequisiteKind::TimeElapsed => "time_elapsed",
            PrerequisiteKind::CustomScript => "custom_script",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    NotEmpty,
    IsTrue,
    IsFalse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiMethod {
    Get,
    #[default]
    Post,
}

/// Shape the external API response must match
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExpectedResponse {
    /// Exact status code; any 2xx when absent
    #[serde(default)]
    pub status: Option<u16>,
    /// Dotted path -> expected JSON value
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    /// Dotted paths that must be present (any value)
    #[serde(default)]
    pub required_fields: Vec<String>,
}

/// Point in the process lifetime that elapsed time is measured from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum TimeReference {
    Creation,
    LastTransition,
    StateEntry { state: String },
}
