//! The routing/validation state machine.
//!
//! A [`LoopController`] alternates a [`Supervisor`] step (choose the next
//! specialist or end) with a [`Validator`] step (decide whether the original
//! request is satisfied) over a [`TaskState`], enforcing a per-specialist
//! visit cap and a global iteration budget so that a run always terminates,
//! whatever the decision source replies.

pub mod config;
pub mod controller;
pub mod decision;
pub mod events;
mod oracle;
pub mod prompts;
pub mod store;
pub mod supervisor;
pub mod validator;

pub use config::{LoopLimits, PromptConfig, RouterConfig};
pub use controller::{CONTROLLER, LoopController, SPECIALIST_FAILURE_MARKER};
pub use decision::{Next, Outcome, RoutingDecision, ValidationDecision, decode_routing, decode_validation};
pub use events::LoopEvent;
pub use store::{InMemoryTaskStore, TaskStore};
pub use supervisor::Supervisor;
pub use switchyard_common::{TaskState, Termination};
pub use validator::Validator;
