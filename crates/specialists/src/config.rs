//! Configuration for specialist handlers (`[[specialists]]` entries).

use serde::{Deserialize, Serialize};

/// Which handler implementation backs a specialist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialistKind {
    Static,
    Http,
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistConfig {
    /// Id the router uses; must match what the decision source is told
    pub id: String,

    /// One-line responsibility shown in the supervisor prompt
    pub description: String,

    pub kind: SpecialistKind,

    /// Canned reply (static)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,

    /// Backend URL (http)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Request timeout for the backend (http)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Role instructions (llm)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Sampling temperature (llm)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl SpecialistConfig {
    pub fn static_reply(
        id: impl Into<String>,
        description: impl Into<String>,
        reply: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            kind: SpecialistKind::Static,
            reply: Some(reply.into()),
            endpoint: None,
            timeout_ms: default_timeout_ms(),
            system_prompt: None,
            temperature: None,
        }
    }

    pub fn http(
        id: impl Into<String>,
        description: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            kind: SpecialistKind::Http,
            reply: None,
            endpoint: Some(endpoint.into()),
            ..Self::static_reply(id, description, "")
        }
    }

    pub fn llm(
        id: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            kind: SpecialistKind::Llm,
            reply: None,
            system_prompt: Some(system_prompt.into()),
            ..Self::static_reply(id, description, "")
        }
    }
}
