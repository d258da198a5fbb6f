use crate::process::ActorType;

/// Decides what justification a committed record carries.
///
/// - system: always `None`
/// - user: optional, unless `require_user_justification` is set and the move is forced
/// - agent: mandatory when the move is forced
///
/// Only presence is checked, never content. Blank strings count as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JustificationPolicy {
    pub require_user_justification: bool,
}

/// The attempt lacks a justification the policy demands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JustificationRequired;

impl JustificationPolicy {
    pub fn new(require_user_justification: bool) -> Self {
        Self {
            require_user_justification,
        }
    }

    pub fn resolve(
        &self,
        actor_type: ActorType,
        forced: bool,
        justification: Option<&str>,
    ) -> Result<Option<String>, JustificationRequired> {
        let provided = justification
            .map(str::trim)
            .filter(|j| !j.is_empty())
            .map(str::to_string);

        match actor_type {
            ActorType::System => Ok(None),
            ActorType::User if forced && self.require_user_justification && provided.is_none() => {
                Err(JustificationRequired)
            }
            ActorType::User => Ok(provided),
            ActorType::Agent if forced && provided.is_none() => Err(JustificationRequired),
            ActorType::Agent => Ok(provided),
        }
    }
}
