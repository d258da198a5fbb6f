// Process instances, their append-only history, and the store contract

pub mod locks;
pub mod store;
pub mod types;

pub use locks::{ProcessLockGuard, ProcessLocks};
pub use store::{InMemoryProcessStore, ProcessFilter, ProcessStore, StoreError};
pub use types::{lookup_path, lookup_value_path, ActorType, ProcessInstance, TransitionRecord};
