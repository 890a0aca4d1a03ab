//! The supervisor step: pick the next specialist or end the task.

use std::sync::Arc;
use std::time::Duration;

use switchyard_common::{Result, TaskState};
use switchyard_llm::LlmClient;
use switchyard_specialists::SpecialistRegistry;
use tracing::{info, warn};

use crate::decision::{RouteResolution, decode_routing, resolve_route};
use crate::oracle::consult;
use crate::prompts::{self, Sampling};

pub const AUTHOR: &str = "supervisor";

/// What the loop does after a successful supervisor step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteStep {
    End,
    Dispatch(String),
    /// The chosen specialist is over its visit cap; go straight to validation.
    ForceValidation { specialist: String, visits: u32 },
}

/// An unknown id that was replaced by a registered one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    pub rejected: String,
    pub applied: String,
}

#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub step: RouteStep,
    pub reason: String,
    pub fallback: Option<Fallback>,
}

pub struct Supervisor {
    llm: Arc<dyn LlmClient>,
    registry: Arc<SpecialistRegistry>,
    preamble: String,
    fallback_specialist: String,
    visit_cap: u32,
    timeout: Duration,
    sampling: Sampling,
}

impl Supervisor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<SpecialistRegistry>,
        fallback_specialist: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            registry,
            preamble: prompts::DEFAULT_SUPERVISOR_PREAMBLE.to_string(),
            fallback_specialist: fallback_specialist.into(),
            visit_cap: 2,
            timeout: Duration::from_secs(60),
            sampling: Sampling::default(),
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    pub fn with_visit_cap(mut self, visit_cap: u32) -> Self {
        self.visit_cap = visit_cap;
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

    /// Consult the decision source once and apply the routing policy.
    ///
    /// Returns `Decode` when the reply is not a well-formed decision and
    /// `Timeout`/`Llm` when the decision source fails; the log is untouched in
    /// those cases. On success the rationale is appended as a note.
    pub async fn route(&self, state: &mut TaskState) -> Result<RouteOutcome> {
        let request = prompts::supervisor_request(
            state,
            &self.registry,
            &self.preamble,
            self.visit_cap,
            self.sampling,
        );
        let raw = consult(self.llm.as_ref(), request, self.timeout, AUTHOR).await?;
        let decision = decode_routing(&raw)?;
        let reason = decision.reason.clone();

        let (target, fallback) =
            match resolve_route(&decision, state, &self.registry, &self.fallback_specialist) {
                RouteResolution::End => {
                    info!(thread_id = %state.thread_id(), %reason, "Supervisor ended the task");
                    state.note(AUTHOR, format!("route to END: {reason}"));
                    return Ok(RouteOutcome {
                        step: RouteStep::End,
                        reason,
                        fallback: None,
                    });
                }
                RouteResolution::Dispatch(id) => (id, None),
                RouteResolution::Fallback { rejected, applied } => {
                    warn!(
                        thread_id = %state.thread_id(),
                        rejected = %rejected,
                        applied = %applied,
                        "Supervisor named an unknown specialist, applying fallback"
                    );
                    (applied.clone(), Some(Fallback { rejected, applied }))
                }
            };

        info!(thread_id = %state.thread_id(), specialist = %target, %reason, "Supervisor routed");
        state.note(AUTHOR, format!("route to {target}: {reason}"));
        if let Some(fb) = &fallback {
            state.note(
                AUTHOR,
                format!(
                    "[fallback] unknown specialist '{}' replaced by '{}'",
                    fb.rejected, fb.applied
                ),
            );
        }

        let visits = state.visit_count(&target);
        if visits > self.visit_cap {
            warn!(
                thread_id = %state.thread_id(),
                specialist = %target,
                visits,
                cap = self.visit_cap,
                "Visit cap exceeded, forcing validation"
            );
            state.note(
                AUTHOR,
                format!(
                    "[no-progress] '{target}' already ran {visits} times (cap {}); no further progress expected, moving to validation",
                    self.visit_cap
                ),
            );
            return Ok(RouteOutcome {
                step: RouteStep::ForceValidation {
                    specialist: target,
                    visits,
                },
                reason,
                fallback,
            });
        }

        state.set_current_specialist(target.clone());
        Ok(RouteOutcome {
            step: RouteStep::Dispatch(target),
            reason,
            fallback,
        })
    }
}
