// Transition executor: applies exactly one state change under the
// actor/justification policy, then hands over to auto-progression.

pub mod alerts;
pub mod errors;
pub mod executor;
pub mod policy;

pub use alerts::{AlertNotifier, Signal, SignalCollaborator, TracingAlertNotifier, TransitionAlert};
pub use errors::TransitionError;
pub use executor::{
    ExecutorSettings, TransitionExecutor, TransitionOutcome, TransitionRequest, TRIGGER_AGENT,
    TRIGGER_MANUAL, TRIGGER_PREREQUISITE_MET,
};
pub use policy::{JustificationPolicy, JustificationRequired};
