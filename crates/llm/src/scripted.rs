//! A decision source that replays canned responses.
//!
//! Used to drive the routing loop deterministically: for a fixed script the
//! loop's transitions are fully determined.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use switchyard_common::{Result, SwitchyardError};

use crate::client::{LlmClient, LlmRequest, LlmResponse};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
    Stall(Duration, String),
}

/// Replays queued replies in order and records every request it receives.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a client from a list of raw texts.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        for text in texts {
            client.push_text(text);
        }
        client
    }

    pub fn push_text(&self, text: impl Into<String>) -> &Self {
        self.queue(Reply::Text(text.into()))
    }

    /// Queue a transport-level failure.
    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        self.queue(Reply::Fail(message.into()))
    }

    /// Queue a reply that only arrives after `delay`.
    pub fn push_stalled(&self, delay: Duration, text: impl Into<String>) -> &Self {
        self.queue(Reply::Stall(delay, text.into()))
    }

    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        lock(&self.requests).clone()
    }

    fn queue(&self, reply: Reply) -> &Self {
        lock(&self.replies).push_back(reply);
        self
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        lock(&self.requests).push(request);
        let next = lock(&self.replies).pop_front();

        let content = match next {
            Some(Reply::Text(text)) => text,
            Some(Reply::Fail(message)) => return Err(SwitchyardError::Llm(message)),
            Some(Reply::Stall(delay, text)) => {
                tokio::time::sleep(delay).await;
                text
            }
            None => return Err(SwitchyardError::Llm("script exhausted".into())),
        };

        Ok(LlmResponse {
            content,
            model: "scripted".to_string(),
            usage: None,
            finish_reason: Some("stop".to_string()),
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatMessage;

    #[tokio::test]
    async fn replays_in_order_and_records_requests() {
        let client = ScriptedClient::from_texts(["first", "second"]);

        let a = client
            .complete(LlmRequest::default().message(ChatMessage::user("one")))
            .await
            .unwrap();
        let b = client.complete(LlmRequest::default()).await.unwrap();

        assert_eq!(a.content, "first");
        assert_eq!(b.content, "second");
        assert_eq!(client.remaining(), 0);
        let seen = client.requests();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].messages[0].content, "one");
    }

    #[tokio::test]
    async fn exhausted_script_is_an_llm_error() {
        let client = ScriptedClient::new();
        let err = client.complete(LlmRequest::default()).await.unwrap_err();
        assert!(matches!(err, SwitchyardError::Llm(_)));
    }

    #[tokio::test]
    async fn queued_failure_surfaces() {
        let client = ScriptedClient::new();
        client.push_failure("connection refused").push_text("after");

        assert!(client.complete(LlmRequest::default()).await.is_err());
        assert_eq!(
            client.complete(LlmRequest::default()).await.unwrap().content,
            "after"
        );
    }
}
