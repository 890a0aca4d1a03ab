//! Specialist handlers and the registry the router dispatches through.
//!
//! Three kinds of handler are provided:
//!
//! - **Static**: a fixed reply, used for the catch-all fallback
//! - **HTTP**: forwards the task to a backend service (domain registry
//!   lookups, log and metrics queries) and returns its answer
//! - **LLM**: answers with the decision source under its own system prompt
//!
//! ```text
//!                 ┌──────────────────────┐
//!   router ─────► │  SpecialistRegistry  │  id → Arc<dyn Specialist>
//!                 └──────────┬───────────┘
//!            ┌───────────────┼────────────────┐
//!            ▼               ▼                ▼
//!     StaticSpecialist  HttpSpecialist   LlmSpecialist
//! ```

pub mod config;
pub mod http;
pub mod llm;
pub mod registry;
pub mod static_reply;

pub use config::{SpecialistConfig, SpecialistKind};
pub use http::HttpSpecialist;
pub use llm::LlmSpecialist;
pub use registry::SpecialistRegistry;
pub use static_reply::StaticSpecialist;
pub use switchyard_common::Specialist;
