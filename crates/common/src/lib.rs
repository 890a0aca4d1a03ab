//! Common types and traits shared across the Switchyard crates.
//!
//! This crate holds the conversation model every step of the routing loop
//! reads and appends to, the capability trait specialists implement, and the
//! error type the library crates return.

pub mod error;
pub mod message;
pub mod state;
pub mod traits;

pub use error::{Result, SwitchyardError};
pub use message::{Message, MessageRole};
pub use state::{TaskState, Termination};
pub use traits::Specialist;
