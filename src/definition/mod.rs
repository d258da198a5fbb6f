// Workflow definition model: states, prerequisites, flow order, and the
// registry that hands out immutable snapshots of them.

pub mod loader;
pub mod prerequisite;
pub mod registry;
pub mod types;
pub mod validation;

pub use loader::{DefinitionSource, DirectoryDefinitionSource, InMemoryDefinitionSource};
pub use prerequisite::{
    ApiMethod, ComparisonOperator, ExpectedResponse, PrerequisiteCheck, PrerequisiteKind,
    PrerequisiteSpec, TimeReference,
};
pub use registry::DefinitionRegistry;
pub use types::{StateDefinition, WorkflowDefinition, DEFAULT_MAX_CASCADE_DEPTH};
pub use validation::{validate, ValidationIssue};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Workflow definition not found: {0}")]
    NotFound(String),

    #[error("Definition file declares kanban '{found}' but '{requested}' was requested")]
    Mismatch { requested: String, found: String },

    #[error("Invalid workflow definition '{kanban_id}': {}", format_issues(.issues))]
    Invalid {
        kanban_id: String,
        issues: Vec<ValidationIssue>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
