//! The per-task state passed between the routing loop's steps.

use crate::message::{Message, MessageRole};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why a run of the routing loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// The supervisor chose the END sentinel.
    RouterEnded,
    /// The validator decided every sub-task is satisfied.
    Finished,
    /// The global iteration budget ran out.
    IterationBudget,
    /// A step kept producing undecodable output.
    Undecidable { step: String },
    /// An external cancellation signal was observed between steps.
    Cancelled,
}

impl Termination {
    /// Bracketed marker written into the log when the loop stops.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::RouterEnded => "[end]",
            Self::Finished => "[finished]",
            Self::IterationBudget => "[forced-finish]",
            Self::Undecidable { .. } => "[undecidable]",
            Self::Cancelled => "[cancelled]",
        }
    }

    /// Whether the task may be picked up again by another run.
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// The accumulating record of one task (one conversation thread).
///
/// The log is append-only: `messages[0]` is always the original user request,
/// entries are never altered or removed, and visit counts only increase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "StoredTaskState")]
pub struct TaskState {
    thread_id: String,
    messages: Vec<Message>,
    current_specialist: Option<String>,
    visit_counts: BTreeMap<String, u32>,
    iteration: u32,
    termination: Option<Termination>,
}

impl TaskState {
    /// Start a task from the user's initial request.
    pub fn new(thread_id: impl Into<String>, initial_user_message: impl Into<String>) -> Self {
        let first = Message::new(MessageRole::User, "user", initial_user_message, 0);
        Self {
            thread_id: thread_id.into(),
            messages: vec![first],
            current_specialist: None,
            visit_counts: BTreeMap::new(),
            iteration: 0,
            termination: None,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The request that opened the task.
    pub fn original_request(&self) -> &Message {
        // Construction and deserialization both guarantee at least one message.
        &self.messages[0]
    }

    pub fn last_message(&self) -> &Message {
        self.messages.last().unwrap_or(&self.messages[0])
    }

    /// Most recent specialist-result message, if any specialist ran yet.
    pub fn last_specialist_result(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_specialist_result())
    }

    pub fn current_specialist(&self) -> Option<&str> {
        self.current_specialist.as_deref()
    }

    pub fn visit_count(&self, specialist: &str) -> u32 {
        self.visit_counts.get(specialist).copied().unwrap_or(0)
    }

    pub fn visit_counts(&self) -> &BTreeMap<String, u32> {
        &self.visit_counts
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// True once the task reached a terminal outcome that a new run must not reopen.
    pub fn is_settled(&self) -> bool {
        self.termination
            .as_ref()
            .is_some_and(|t| !t.is_resumable())
    }

    /// Append an entry to the log and return it.
    pub fn append(
        &mut self,
        role: MessageRole,
        author: impl Into<String>,
        content: impl Into<String>,
    ) -> &Message {
        let sequence = self.messages.len() as u64;
        self.messages
            .push(Message::new(role, author, content, sequence));
        &self.messages[self.messages.len() - 1]
    }

    /// Append a `system-note` entry.
    pub fn note(&mut self, author: impl Into<String>, content: impl Into<String>) -> &Message {
        self.append(MessageRole::SystemNote, author, content)
    }

    /// Append a specialist's output and count the visit.
    pub fn record_specialist_result(
        &mut self,
        specialist: &str,
        content: impl Into<String>,
    ) -> &Message {
        *self.visit_counts.entry(specialist.to_string()).or_insert(0) += 1;
        self.append(MessageRole::SpecialistResult, specialist, content)
    }

    pub fn set_current_specialist(&mut self, specialist: impl Into<String>) {
        self.current_specialist = Some(specialist.into());
    }

    /// Count a completed supervisor/validator round, returning the new value.
    pub fn advance_iteration(&mut self) -> u32 {
        self.iteration += 1;
        self.iteration
    }

    pub fn set_termination(&mut self, termination: Termination) {
        self.termination = Some(termination);
    }

    /// Clear a resumable termination before the loop picks the task up again.
    pub fn reopen(&mut self) {
        if self.termination.as_ref().is_some_and(Termination::is_resumable) {
            self.termination = None;
        }
    }
}

/// Wire shape of a persisted task, checked before it becomes a [`TaskState`].
#[derive(Deserialize)]
struct StoredTaskState {
    thread_id: String,
    messages: Vec<Message>,
    #[serde(default)]
    current_specialist: Option<String>,
    #[serde(default)]
    visit_counts: BTreeMap<String, u32>,
    #[serde(default)]
    iteration: u32,
    #[serde(default)]
    termination: Option<Termination>,
}

impl TryFrom<StoredTaskState> for TaskState {
    type Error = String;

    fn try_from(stored: StoredTaskState) -> Result<Self, Self::Error> {
        let first = stored
            .messages
            .first()
            .ok_or_else(|| "task state has no messages".to_string())?;
        if first.role != MessageRole::User {
            return Err(format!(
                "first message must be the user request, found {}",
                first.role
            ));
        }
        if let Some((pos, msg)) = stored
            .messages
            .iter()
            .enumerate()
            .find(|(pos, msg)| msg.sequence != *pos as u64)
        {
            return Err(format!(
                "message at position {pos} has sequence {}",
                msg.sequence
            ));
        }

        Ok(Self {
            thread_id: stored.thread_id,
            messages: stored.messages,
            current_specialist: stored.current_specialist,
            visit_counts: stored.visit_counts,
            iteration: stored.iteration,
            termination: stored.termination,
        })
    }
}
