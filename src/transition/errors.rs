use thiserror::Error;

use crate::definition::DefinitionError;
use crate::process::{ActorType, StoreError};

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("State '{state}' is not part of workflow '{kanban_id}'")]
    InvalidState { kanban_id: String, state: String },

    #[error("{actor_type} transition of {process_id} to '{to_state}' is forced and needs a justification")]
    MissingJustification {
        process_id: String,
        to_state: String,
        actor_type: ActorType,
    },

    #[error("Process {process_id} was modified concurrently (expected version {expected}, found {found}); retry")]
    ConcurrentModification {
        process_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for TransitionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict {
                process_id,
                expected,
                found,
            } => TransitionError::ConcurrentModification {
                process_id,
                expected,
                found,
            },
            StoreError::NotFound(id) => TransitionError::ProcessNotFound(id),
            other => TransitionError::Store(other),
        }
    }
}

impl TransitionError {
    /// Hard rejections of an attempt (as opposed to infrastructure failures)
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TransitionError::InvalidState { .. } | TransitionError::MissingJustification { .. }
        )
    }
}
