//! Specialist backed by an HTTP service.
//!
//! The backend receives the original request plus the conversation so far and
//! answers with `{"result": "..."}`, `{"error": "..."}` or plain text. Backend
//! query formats beyond that envelope belong to the backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use switchyard_common::{Result, Specialist, SwitchyardError, TaskState};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct BackendRequest<'a> {
    thread_id: &'a str,
    request: &'a str,
    history: Vec<HistoryEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct HistoryEntry<'a> {
    role: &'static str,
    author: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct BackendReply {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpSpecialist {
    id: String,
    description: String,
    endpoint: String,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl HttpSpecialist {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwitchyardError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            id: id.into(),
            description: description.into(),
            endpoint: endpoint.into(),
            timeout,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request<'a>(&self, state: &'a TaskState) -> BackendRequest<'a> {
        BackendRequest {
            thread_id: state.thread_id(),
            request: &state.original_request().content,
            history: state
                .messages()
                .iter()
                .map(|m| HistoryEntry {
                    role: m.role.as_str(),
                    author: &m.author,
                    content: &m.content,
                })
                .collect(),
        }
    }

    fn interpret(&self, body: &str) -> Result<String> {
        match serde_json::from_str::<BackendReply>(body) {
            Ok(BackendReply {
                error: Some(error), ..
            }) => Err(SwitchyardError::specialist(&self.id, error)),
            Ok(BackendReply {
                result: Some(result),
                ..
            }) => Ok(result),
            Ok(_) => Err(SwitchyardError::specialist(
                &self.id,
                "backend reply has neither `result` nor `error`",
            )),
            // Not our JSON envelope: treat the body as the answer itself.
            Err(_) if !body.trim().is_empty() => Ok(body.trim().to_string()),
            Err(_) => Err(SwitchyardError::specialist(&self.id, "empty backend reply")),
        }
    }
}

#[async_trait]
impl Specialist for HttpSpecialist {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, state: &TaskState) -> Result<String> {
        debug!(
            specialist = %self.id,
            endpoint = %self.endpoint,
            thread_id = %state.thread_id(),
            "Calling backend"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&self.build_request(state))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SwitchyardError::Timeout {
                        operation: format!("specialist '{}'", self.id),
                        after_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    SwitchyardError::specialist(&self.id, format!("backend unreachable: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SwitchyardError::specialist(&self.id, format!("unreadable reply: {e}")))?;

        if !status.is_success() {
            warn!(specialist = %self.id, %status, "Backend returned an error status");
            return Err(SwitchyardError::specialist(
                &self.id,
                format!("backend error {status}: {body}"),
            ));
        }

        self.interpret(&body)
    }
}
