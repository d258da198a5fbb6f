use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::template::TemplateError;
use crate::definition::PrerequisiteKind;

/// Outcome of one prerequisite, stored verbatim in the transition record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrerequisiteResult {
    pub kind: PrerequisiteKind,
    pub satisfied: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Raised without affecting `satisfied` (e.g. time above maximum)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
}

impl PrerequisiteResult {
    pub(crate) fn from_evaluation(
        kind: PrerequisiteKind,
        message: &str,
        outcome: Result<Evaluation, PrerequisiteEvaluationError>,
    ) -> Self {
        match outcome {
            Ok(evaluation) => Self {
                kind,
                satisfied: evaluation.satisfied,
                message: message.to_string(),
                detail: evaluation.detail,
                error: None,
                alert: evaluation.alert,
            },
            Err(e) => Self {
                kind,
                satisfied: false,
                message: message.to_string(),
                detail: None,
                error: Some(e.to_string()),
                alert: None,
            },
        }
    }
}

/// What a single strategy decided
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    pub satisfied: bool,
    pub detail: Option<String>,
    pub alert: Option<String>,
}

impl Evaluation {
    pub fn satisfied(detail: impl Into<String>) -> Self {
        Self {
            satisfied: true,
            detail: Some(detail.into()),
            alert: None,
        }
    }

    pub fn unsatisfied(detail: impl Into<String>) -> Self {
        Self {
            satisfied: false,
            detail: Some(detail.into()),
            alert: None,
        }
    }

    pub fn with_alert(mut self, alert: Option<String>) -> Self {
        self.alert = alert;
        self
    }
}

/// Aggregate result of evaluating a state's prerequisites
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub all_satisfied: bool,
    pub results: BTreeMap<String, PrerequisiteResult>,
}

impl EvaluationReport {
    pub fn unmet(&self) -> impl Iterator<Item = (&String, &PrerequisiteResult)> {
        self.results.iter().filter(|(_, r)| !r.satisfied)
    }

    /// Advisory messages for every unmet prerequisite
    pub fn advisories(&self) -> Vec<String> {
        self.unmet()
            .map(|(id, r)| {
                let mut text = if r.message.is_empty() {
                    format!("Prerequisite '{id}' not met")
                } else {
                    r.message.clone()
                };
                if let Some(error) = &r.error {
                    text.push_str(&format!(" ({error})"));
                } else if let Some(detail) = &r.detail {
                    text.push_str(&format!(" ({detail})"));
                }
                text
            })
            .collect()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|(id, r)| r.alert.as_ref().map(|a| format!("{id}: {a}")))
            .collect()
    }
}

/// Failure inside an `external_api` or `custom_script` check.
/// Recovered by the evaluator and recorded as "not satisfied".
#[derive(Debug, Error)]
pub enum PrerequisiteEvaluationError {
    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("No script handler registered as '{0}'")]
    UnknownHandler(String),

    #[error("Malformed handler output: {0}")]
    MalformedOutput(String),

    #[error("Handler failed: {0}")]
    Handler(String),
}
