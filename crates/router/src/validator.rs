//! The validator step: decide whether the original request is satisfied.

use std::sync::Arc;
use std::time::Duration;

use switchyard_common::{Result, TaskState};
use switchyard_llm::LlmClient;
use tracing::{info, warn};

use crate::decision::{Outcome, decode_validation, resolve_outcome};
use crate::oracle::consult;
use crate::prompts::{self, Sampling};

pub const AUTHOR: &str = "validator";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Always `Continue` or `Finish` after resolution.
    pub outcome: Outcome,
    pub reason: String,
    /// The raw outcome, when it was unrecognized and replaced.
    pub unrecognized: Option<String>,
}

pub struct Validator {
    llm: Arc<dyn LlmClient>,
    preamble: String,
    full_history: bool,
    timeout: Duration,
    sampling: Sampling,
}

impl Validator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            preamble: prompts::DEFAULT_VALIDATOR_PREAMBLE.to_string(),
            full_history: false,
            timeout: Duration::from_secs(60),
            sampling: Sampling::default(),
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    pub fn with_full_history(mut self, full_history: bool) -> Self {
        self.full_history = full_history;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// Consult the decision source and resolve its verdict.
    ///
    /// `final_round` is true when this is the last round the iteration budget
    /// allows; an unrecognized outcome then resolves to FINISH instead of
    /// CONTINUE.
    pub async fn validate(&self, state: &mut TaskState, final_round: bool) -> Result<Verdict> {
        let request =
            prompts::validator_request(state, &self.preamble, self.full_history, self.sampling);
        let raw = consult(self.llm.as_ref(), request, self.timeout, AUTHOR).await?;
        let decision = decode_validation(&raw)?;

        let outcome = resolve_outcome(&decision.outcome, final_round);
        let unrecognized = match &decision.outcome {
            Outcome::Unrecognized(raw) => {
                warn!(
                    thread_id = %state.thread_id(),
                    raw_outcome = %raw,
                    applied = %outcome,
                    final_round,
                    "Validator returned an unrecognized outcome, applying fallback"
                );
                Some(raw.clone())
            }
            _ => None,
        };

        info!(thread_id = %state.thread_id(), %outcome, reason = %decision.reason, "Validator decided");
        state.note(AUTHOR, format!("{outcome}: {}", decision.reason));
        if let Some(raw) = &unrecognized {
            state.note(
                AUTHOR,
                format!("[fallback] unrecognized outcome '{raw}' treated as {outcome}"),
            );
        }

        Ok(Verdict {
            outcome,
            reason: decision.reason,
            unrecognized,
        })
    }
}
