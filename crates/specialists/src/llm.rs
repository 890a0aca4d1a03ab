//! Specialist that answers with the decision source itself.

use async_trait::async_trait;
use std::sync::Arc;
use switchyard_common::{MessageRole, Result, Specialist, SwitchyardError, TaskState};
use switchyard_llm::{ChatMessage, LlmClient, LlmRequest};
use tracing::debug;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful specialist in a multi-agent \
assistant. Answer the user's original request as directly as possible. Do not \
describe the routing process.";

pub struct LlmSpecialist {
    id: String,
    description: String,
    system_prompt: String,
    temperature: Option<f32>,
    llm: Arc<dyn LlmClient>,
}

impl LlmSpecialist {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: None,
            llm,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_request(&self, state: &TaskState) -> LlmRequest {
        let mut request = LlmRequest::with_system(&self.system_prompt).temperature(self.temperature);
        for msg in state.messages() {
            request = request.message(match msg.role {
                MessageRole::User => ChatMessage::user(&msg.content),
                _ => ChatMessage::assistant(format!("{}: {}", msg.author, msg.content)),
            });
        }
        request
    }
}

#[async_trait]
impl Specialist for LlmSpecialist {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, state: &TaskState) -> Result<String> {
        debug!(specialist = %self.id, model = %self.llm.model_name(), "Asking LLM specialist");

        let response = self
            .llm
            .complete(self.build_request(state))
            .await
            .map_err(|e| match e {
                SwitchyardError::Timeout { .. } => e,
                other => SwitchyardError::specialist(&self.id, other.to_string()),
            })?;

        let content = response.content.trim();
        if content.is_empty() {
            return Err(SwitchyardError::specialist(&self.id, "model returned no content"));
        }
        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_llm::{Role, ScriptedClient};

    #[tokio::test]
    async fn answers_from_the_model_with_full_transcript() {
        let llm = Arc::new(ScriptedClient::from_texts(["  Here is a couplet.  "]));
        let specialist = LlmSpecialist::new("creative-other", "Creative requests", llm.clone())
            .with_system_prompt("Write couplets.")
            .with_temperature(Some(0.7));

        let mut state = TaskState::new("t", "write me a couplet");
        state.note("supervisor", "creative request");

        let answer = specialist.invoke(&state).await.unwrap();
        assert_eq!(answer, "Here is a couplet.");

        let seen = llm.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].system_prompt.as_deref(), Some("Write couplets."));
        assert_eq!(seen[0].temperature, Some(0.7));
        assert_eq!(seen[0].messages.len(), 2);
        assert_eq!(seen[0].messages[0].role, Role::User);
        assert_eq!(seen[0].messages[1].content, "supervisor: creative request");
    }

    #[tokio::test]
    async fn empty_model_output_is_a_failure() {
        let llm = Arc::new(ScriptedClient::from_texts(["   "]));
        let specialist = LlmSpecialist::new("creative-other", "Creative requests", llm);
        let state = TaskState::new("t", "tell a joke");

        let err = specialist.invoke(&state).await.unwrap_err();
        assert!(matches!(err, SwitchyardError::Specialist { .. }));
    }

    #[tokio::test]
    async fn transport_failure_is_reported_against_the_specialist() {
        let llm = Arc::new(ScriptedClient::new());
        llm.push_failure("connection reset");
        let specialist = LlmSpecialist::new("creative-other", "Creative requests", llm);

        let err = specialist.invoke(&TaskState::new("t", "x")).await.unwrap_err();
        assert!(err.to_string().contains("creative-other"));
        assert!(err.to_string().contains("connection reset"));
    }
}
