//! The specialist capability.
//!
//! Defined in `switchyard-common` so that the registry crate and the router
//! can both reference it without depending on each other.

use crate::{Result, TaskState};
use async_trait::async_trait;

/// A handler the router can dispatch a task to.
///
/// Specialists see the conversation read-only; the router turns whatever they
/// return (text or error) into exactly one log entry.
#[async_trait]
pub trait Specialist: Send + Sync {
    /// Stable id the router refers to this specialist by.
    fn id(&self) -> &str;

    /// One-line responsibility shown to the decision source.
    fn description(&self) -> &str;

    /// Produce a result for the current state of the task.
    async fn invoke(&self, state: &TaskState) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SwitchyardError;

    struct Echo;

    #[async_trait]
    impl Specialist for Echo {
        fn id(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Repeats the request"
        }

        async fn invoke(&self, state: &TaskState) -> Result<String> {
            if state.original_request().content.is_empty() {
                return Err(SwitchyardError::specialist(self.id(), "empty request"));
            }
            Ok(state.original_request().content.clone())
        }
    }

    #[tokio::test]
    async fn specialist_reads_state_without_mutating_it() {
        let state = TaskState::new("t", "ping");
        let specialist: Box<dyn Specialist> = Box::new(Echo);

        let out = specialist.invoke(&state).await.unwrap();

        assert_eq!(out, "ping");
        assert_eq!(state.messages().len(), 1);
    }

    #[tokio::test]
    async fn specialist_errors_carry_the_id() {
        let state = TaskState::new("t", "");
        let err = Echo.invoke(&state).await.unwrap_err();
        assert!(matches!(err, SwitchyardError::Specialist { ref id, .. } if id == "echo"));
    }
}
