//! OpenAI-compatible chat completions client.
//!
//! DeepSeek, Ollama and OpenAI all speak this protocol; only the base URL,
//! model name and key differ.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use switchyard_common::{Result, SwitchyardError};
use tracing::debug;

use crate::client::{LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        base_url: Option<String>,
        model: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwitchyardError::Config(format!("Failed to build HTTP client: {e}")))?;

        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            base_url,
            model,
            api_key,
            timeout,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        // Base URLs are accepted with or without the `/v1` suffix.
        if self.base_url.ends_with("/v1") {
            format!("{}/chat/completions", self.base_url)
        } else {
            format!("{}/v1/chat/completions", self.base_url)
        }
    }

    fn wire_role(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    fn build_body<'a>(&'a self, request: &LlmRequest) -> ChatCompletionRequest<'a> {
        let system = request.system_prompt.iter().map(|s| WireMessage {
            role: "system".to_string(),
            content: Some(s.clone()),
        });
        let rest = request.messages.iter().map(|m| WireMessage {
            role: Self::wire_role(m.role).to_string(),
            content: Some(m.content.clone()),
        });

        ChatCompletionRequest {
            model: &self.model,
            messages: system.chain(rest).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    fn map_send_error(&self, err: reqwest::Error) -> SwitchyardError {
        if err.is_timeout() {
            SwitchyardError::Timeout {
                operation: format!("chat completion ({})", self.model),
                after_ms: self.timeout.as_millis() as u64,
            }
        } else {
            SwitchyardError::Llm(format!("chat completion request failed: {err}"))
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let url = self.endpoint();
        debug!(url = %url, model = %self.model, messages = request.messages.len(), "Sending chat completion");

        let mut http_req = self.http_client.post(&url).json(&self.build_body(&request));
        if let Some(ref key) = self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|v| format!(", Retry-After: {v}"))
                .unwrap_or_default();
            let body_text = response.text().await.unwrap_or_default();
            return Err(SwitchyardError::Llm(format!(
                "chat completion API error {status}{retry_after}: {body_text}"
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| SwitchyardError::Llm(format!("Malformed chat completion response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SwitchyardError::Llm("No choices in chat completion response".into()))?;

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
