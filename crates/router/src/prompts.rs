//! Prompt construction for the supervisor and validator calls.
//!
//! Only the structure matters to the loop: both prompts demand a single JSON
//! object and the decoders in [`crate::decision`] never trust that demand.

use std::fmt::Write;
use switchyard_common::TaskState;
use switchyard_llm::{ChatMessage, LlmRequest};
use switchyard_specialists::SpecialistRegistry;
use switchyard_specialists::registry::END_SENTINEL;

pub const DEFAULT_SUPERVISOR_PREAMBLE: &str = "You are the supervisor of a support desk. \
Decide which specialist should act next on the user's request, or finish when \
every part of the request has been answered.";

pub const DEFAULT_VALIDATOR_PREAMBLE: &str = "You check whether an answer fully \
satisfies a user's request. List the sub-tasks in the request, check each one \
against the answer, then decide.";

/// Sampling settings shared by both decision calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sampling {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Build the supervisor request: roster, original request, history and visit counts.
pub fn supervisor_request(
    state: &TaskState,
    registry: &SpecialistRegistry,
    preamble: &str,
    visit_cap: u32,
    sampling: Sampling,
) -> LlmRequest {
    let mut system = String::from(preamble);
    system.push_str("\n\nSpecialists:\n");
    for (id, description) in registry.roster() {
        let _ = writeln!(system, "- {id}: {description}");
    }
    let _ = write!(
        system,
        "\nA specialist that has already run more than {visit_cap} times will not run again.\n\
         Respond with ONLY a JSON object and nothing else:\n\
         {{\"next\": \"<specialist id or {END_SENTINEL}>\", \"reason\": \"<one sentence>\"}}\n\
         Use \"{END_SENTINEL}\" when the request needs no further work."
    );

    let mut user = format!("Original request:\n{}\n", state.original_request().content);
    user.push_str("\nConversation so far:\n");
    for message in state.messages() {
        user.push_str(&message.transcript_line());
        user.push('\n');
    }
    user.push_str("\nVisit counts:\n");
    if state.visit_counts().is_empty() {
        user.push_str("(no specialist has run yet)\n");
    }
    for (id, count) in state.visit_counts() {
        let _ = writeln!(user, "- {id}: {count}");
    }

    build(system, vec![ChatMessage::user(user)], sampling)
}

/// Build the validator request: the original request and the latest result.
pub fn validator_request(
    state: &TaskState,
    preamble: &str,
    full_history: bool,
    sampling: Sampling,
) -> LlmRequest {
    let system = format!(
        "{preamble}\n\n\
         Respond with ONLY a JSON object and nothing else:\n\
         {{\"outcome\": \"CONTINUE\" or \"FINISH\", \"reason\": \"<which sub-tasks are still unmet, if any>\"}}\n\
         Use CONTINUE when any sub-task is unanswered or the answer reports a failure."
    );

    let mut messages = vec![ChatMessage::user(state.original_request().content.clone())];

    if full_history {
        let transcript = state
            .messages()
            .iter()
            .skip(1)
            .map(|m| m.transcript_line())
            .collect::<Vec<_>>()
            .join("\n");
        messages.push(ChatMessage::user(format!("Work log so far:\n{transcript}")));
    }

    let answer = state
        .last_specialist_result()
        .map(|m| format!("{}: {}", m.author, m.content))
        .unwrap_or_else(|| "(no specialist has answered yet)".to_string());
    messages.push(ChatMessage::assistant(answer));

    build(system, messages, sampling)
}

fn build(system: String, messages: Vec<ChatMessage>, sampling: Sampling) -> LlmRequest {
    let mut request = LlmRequest::with_system(system).temperature(sampling.temperature);
    request.max_tokens = sampling.max_tokens;
    messages.into_iter().fold(request, LlmRequest::message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use switchyard_llm::Role;
    use switchyard_specialists::StaticSpecialist;

    fn registry() -> SpecialistRegistry {
        SpecialistRegistry::new()
            .with(Arc::new(StaticSpecialist::new(
                "domain-lookup",
                "Domain registration lookups",
                "ok",
            )))
            .unwrap()
            .with(Arc::new(StaticSpecialist::new("other", "Everything else", "ok")))
            .unwrap()
    }

    #[test]
    fn supervisor_prompt_embeds_roster_history_and_counts() {
        let mut state = TaskState::new("t", "Who owns example.com and what is its QPS?");
        state.note("supervisor", "route to domain-lookup: ownership first");
        state.record_specialist_result("domain-lookup", "Owner: Example Inc.");

        let request = supervisor_request(
            &state,
            &registry(),
            DEFAULT_SUPERVISOR_PREAMBLE,
            2,
            Sampling {
                temperature: Some(0.4),
                max_tokens: None,
            },
        );

        let system = request.system_prompt.as_deref().unwrap();
        assert!(system.contains("- domain-lookup: Domain registration lookups"));
        assert!(system.contains("- other: Everything else"));
        assert!(system.contains("\"next\""));
        assert_eq!(request.temperature, Some(0.4));

        let user = &request.messages[0].content;
        assert!(user.starts_with("Original request:\nWho owns example.com"));
        assert!(user.contains("[2] domain-lookup (specialist-result): Owner: Example Inc."));
        assert!(user.contains("- domain-lookup: 1"));
    }

    #[test]
    fn validator_prompt_uses_request_and_latest_result() {
        let mut state = TaskState::new("t", "QPS for example.com");
        state.record_specialist_result("metrics-query", "first");
        state.note("validator", "CONTINUE: incomplete");
        state.record_specialist_result("metrics-query", "QPS is 1200");

        let request = validator_request(&state, DEFAULT_VALIDATOR_PREAMBLE, false, Sampling::default());
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::User);
        assert_eq!(request.messages[0].content, "QPS for example.com");
        assert_eq!(request.messages[1].role, Role::Assistant);
        assert_eq!(request.messages[1].content, "metrics-query: QPS is 1200");

        let full = validator_request(&state, DEFAULT_VALIDATOR_PREAMBLE, true, Sampling::default());
        assert_eq!(full.messages.len(), 3);
        assert!(full.messages[1].content.contains("CONTINUE: incomplete"));
    }
}
