//! Error types for Switchyard.
//!
//! Policy violations (a well-formed decision naming an unknown specialist or
//! outcome) never show up here; they are resolved where they are detected.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwitchyardError {
    /// Decision source output was not well-formed structured data.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A specialist handler failed. Only observed inside the invocation wrapper.
    #[error("Specialist '{id}' failed: {message}")]
    Specialist { id: String, message: String },

    /// The decision source itself failed (unreachable, auth, exhausted retries).
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("{operation} timed out after {after_ms} ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SwitchyardError {
    pub fn specialist(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Specialist {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, SwitchyardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specialist_error_names_the_handler() {
        let err = SwitchyardError::specialist("domain-lookup", "connection refused");
        assert_eq!(
            err.to_string(),
            "Specialist 'domain-lookup' failed: connection refused"
        );
    }

    #[test]
    fn timeout_display_and_predicate() {
        let err = SwitchyardError::Timeout {
            operation: "supervisor call".into(),
            after_ms: 1500,
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "supervisor call timed out after 1500 ms");
        assert!(!SwitchyardError::Decode("x".into()).is_timeout());
    }
}
