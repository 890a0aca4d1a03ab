//! The loop controller: drives supervisor, specialist and validator rounds
//! until the task reaches a terminal outcome.
//!
//! ```text
//! ROUTING:
//!   route ──► END ─────────────────────────────► TERMINAL
//!     │
//!     ├──► dispatch ──► specialist ──┐
//!     └──► over visit cap ───────────┤
//!                                    ▼
//!                                validate ──► FINISH ──► TERMINAL
//!                                    │
//!                          iteration += 1 ──► budget spent ──► TERMINAL
//!                                    │
//!                                 ROUTING
//! ```
//!
//! The controller owns the task state for the duration of a run. Cancellation
//! is observed between steps, never in the middle of an external call.

use std::sync::Arc;
use std::time::Duration;

use switchyard_common::{Result, SwitchyardError, TaskState, Termination};
use switchyard_llm::{LlmClient, build_llm_client};
use switchyard_specialists::SpecialistRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{LoopLimits, RouterConfig};
use crate::decision::Outcome;
use crate::events::{EventSender, LoopEvent};
use crate::prompts::Sampling;
use crate::supervisor::{self, RouteOutcome, RouteStep, Supervisor};
use crate::validator::{self, Validator, Verdict};

/// Author of the notes the controller writes itself.
pub const CONTROLLER: &str = "controller";

/// Prefix of a specialist-result that reports a failed invocation.
pub const SPECIALIST_FAILURE_MARKER: &str = "[specialist-failure]";

pub struct LoopController {
    supervisor: Supervisor,
    validator: Validator,
    registry: Arc<SpecialistRegistry>,
    limits: LoopLimits,
}

impl LoopController {
    /// Assemble a controller around an existing decision source and registry.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<SpecialistRegistry>,
        config: &RouterConfig,
    ) -> Result<Self> {
        if config.limits.max_iterations == 0 {
            return Err(SwitchyardError::Config(
                "limits.max_iterations must be at least 1".into(),
            ));
        }
        if !registry.contains(&config.fallback_specialist) {
            return Err(SwitchyardError::Config(format!(
                "fallback specialist '{}' is not registered",
                config.fallback_specialist
            )));
        }

        let sampling = Sampling {
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        };
        let oracle_timeout = Duration::from_millis(config.limits.oracle_timeout_ms);

        let mut supervisor =
            Supervisor::new(llm.clone(), registry.clone(), config.fallback_specialist.clone())
                .with_visit_cap(config.limits.visit_cap)
                .with_timeout(oracle_timeout)
                .with_sampling(sampling);
        if let Some(preamble) = &config.prompts.supervisor {
            supervisor = supervisor.with_preamble(preamble.clone());
        }

        let mut validator = Validator::new(llm)
            .with_full_history(config.validator_full_history)
            .with_timeout(oracle_timeout)
            .with_sampling(sampling);
        if let Some(preamble) = &config.prompts.validator {
            validator = validator.with_preamble(preamble.clone());
        }

        Ok(Self {
            supervisor,
            validator,
            registry,
            limits: config.limits.clone(),
        })
    }

    /// Build the decision source and every configured specialist, then the controller.
    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| SwitchyardError::Config(e.to_string()))?;
        let llm = build_llm_client(&config.llm)?;
        let registry = SpecialistRegistry::from_configs(&config.specialists, llm.clone())?;
        Self::new(llm, Arc::new(registry), config)
    }

    pub fn registry(&self) -> &Arc<SpecialistRegistry> {
        &self.registry
    }

    pub fn limits(&self) -> &LoopLimits {
        &self.limits
    }

    /// Run the loop on `state` until it terminates.
    ///
    /// A state that already settled is returned unchanged; a cancelled one
    /// resumes from its counters. `Err` is returned only when the decision
    /// source fails outright, after a `[fatal]` note was written to the log.
    pub async fn run(&self, state: &mut TaskState, cancel: &CancellationToken) -> Result<Termination> {
        self.run_observed(state, cancel, None).await
    }

    /// Like [`run`](Self::run), streaming a [`LoopEvent`] per transition.
    pub async fn run_observed(
        &self,
        state: &mut TaskState,
        cancel: &CancellationToken,
        events: Option<&EventSender>,
    ) -> Result<Termination> {
        let events = Emitter(events);

        if state.is_settled() {
            if let Some(done) = state.termination() {
                info!(thread_id = %state.thread_id(), termination = ?done, "Task already settled");
                return Ok(done.clone());
            }
        }
        state.reopen();

        info!(
            thread_id = %state.thread_id(),
            iteration = state.iteration(),
            max_iterations = self.limits.max_iterations,
            "Routing loop started"
        );

        loop {
            if cancel.is_cancelled() {
                return Ok(self.terminate(state, Termination::Cancelled, &events));
            }
            if state.iteration() >= self.limits.max_iterations {
                return Ok(self.terminate(state, Termination::IterationBudget, &events));
            }

            let Some(routed) = self.route_with_retry(state, &events).await? else {
                let undecidable = Termination::Undecidable {
                    step: supervisor::AUTHOR.to_string(),
                };
                return Ok(self.terminate(state, undecidable, &events));
            };

            if let Some(fallback) = &routed.fallback {
                events.emit(LoopEvent::FallbackApplied {
                    step: supervisor::AUTHOR.to_string(),
                    rejected: fallback.rejected.clone(),
                    applied: fallback.applied.clone(),
                });
            }

            match routed.step {
                RouteStep::End => {
                    return Ok(self.terminate(state, Termination::RouterEnded, &events));
                }
                RouteStep::Dispatch(specialist) => {
                    events.emit(LoopEvent::Routed {
                        specialist: specialist.clone(),
                        reason: routed.reason,
                    });
                    if cancel.is_cancelled() {
                        return Ok(self.terminate(state, Termination::Cancelled, &events));
                    }
                    self.invoke_specialist(state, &specialist, &events).await;
                }
                RouteStep::ForceValidation { specialist, visits } => {
                    events.emit(LoopEvent::ForcedValidation { specialist, visits });
                }
            }

            if cancel.is_cancelled() {
                return Ok(self.terminate(state, Termination::Cancelled, &events));
            }

            let final_round = state.iteration() + 1 >= self.limits.max_iterations;
            let Some(verdict) = self.validate_with_retry(state, final_round, &events).await? else {
                let undecidable = Termination::Undecidable {
                    step: validator::AUTHOR.to_string(),
                };
                return Ok(self.terminate(state, undecidable, &events));
            };

            if let Some(raw) = &verdict.unrecognized {
                events.emit(LoopEvent::FallbackApplied {
                    step: validator::AUTHOR.to_string(),
                    rejected: raw.clone(),
                    applied: verdict.outcome.to_string(),
                });
            }
            events.emit(LoopEvent::Validated {
                outcome: verdict.outcome.clone(),
                reason: verdict.reason.clone(),
            });

            if verdict.outcome == Outcome::Finish {
                return Ok(self.terminate(state, Termination::Finished, &events));
            }

            if state.advance_iteration() >= self.limits.max_iterations {
                return Ok(self.terminate(state, Termination::IterationBudget, &events));
            }
        }
    }

    async fn route_with_retry(
        &self,
        state: &mut TaskState,
        events: &Emitter<'_>,
    ) -> Result<Option<RouteOutcome>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.supervisor.route(state).await {
                Ok(outcome) => return Ok(Some(outcome)),
                Err(err) => {
                    if !self.absorb_failure(state, supervisor::AUTHOR, attempt, err, events)? {
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn validate_with_retry(
        &self,
        state: &mut TaskState,
        final_round: bool,
        events: &Emitter<'_>,
    ) -> Result<Option<Verdict>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.validator.validate(state, final_round).await {
                Ok(verdict) => return Ok(Some(verdict)),
                Err(err) => {
                    if !self.absorb_failure(state, validator::AUTHOR, attempt, err, events)? {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Record a failed decision attempt. Returns whether the step may be retried.
    ///
    /// Undecodable output and timeouts use up the step's retry budget; any
    /// other error means the decision source is unavailable and is returned.
    fn absorb_failure(
        &self,
        state: &mut TaskState,
        step: &str,
        attempt: u32,
        err: SwitchyardError,
        events: &Emitter<'_>,
    ) -> Result<bool> {
        match err {
            SwitchyardError::Decode(_) | SwitchyardError::Timeout { .. } => {
                let attempts = self.limits.decode_retries + 1;
                warn!(
                    thread_id = %state.thread_id(),
                    step,
                    attempt,
                    attempts,
                    error = %err,
                    "Decision could not be decoded"
                );
                state.note(
                    CONTROLLER,
                    format!("[decode-error] {step} attempt {attempt} of {attempts}: {err}"),
                );
                let retry = attempt < attempts;
                if retry {
                    events.emit(LoopEvent::DecodeRetry {
                        step: step.to_string(),
                        attempt,
                        error: err.to_string(),
                    });
                }
                Ok(retry)
            }
            other => {
                error!(thread_id = %state.thread_id(), step, error = %other, "Decision source failed");
                state.note(
                    CONTROLLER,
                    format!("[fatal] {step} decision source unavailable: {other}"),
                );
                Err(other)
            }
        }
    }

    /// Invoke a specialist at most once, turning any failure into a result message.
    async fn invoke_specialist(&self, state: &mut TaskState, id: &str, events: &Emitter<'_>) {
        let timeout = Duration::from_millis(self.limits.specialist_timeout_ms);
        let result = match self.registry.get(id) {
            Some(specialist) => match tokio::time::timeout(timeout, specialist.invoke(state)).await {
                Ok(result) => result,
                Err(_) => Err(SwitchyardError::Timeout {
                    operation: format!("specialist '{id}'"),
                    after_ms: self.limits.specialist_timeout_ms,
                }),
            },
            None => Err(SwitchyardError::Registry(format!(
                "specialist '{id}' is not registered"
            ))),
        };

        match result {
            Ok(content) => {
                info!(thread_id = %state.thread_id(), specialist = id, "Specialist completed");
                state.record_specialist_result(id, content.clone());
                events.emit(LoopEvent::SpecialistCompleted {
                    specialist: id.to_string(),
                    content,
                });
            }
            Err(err) => {
                warn!(thread_id = %state.thread_id(), specialist = id, error = %err, "Specialist failed");
                state.record_specialist_result(id, format!("{SPECIALIST_FAILURE_MARKER} {id}: {err}"));
                events.emit(LoopEvent::SpecialistFailed {
                    specialist: id.to_string(),
                    error: err.to_string(),
                });
            }
        }
    }

    fn terminate(&self, state: &mut TaskState, termination: Termination, events: &Emitter<'_>) -> Termination {
        let marker = termination.marker();
        let note = match &termination {
            Termination::IterationBudget => Some(format!(
                "{marker} iteration budget of {} rounds exhausted",
                self.limits.max_iterations
            )),
            Termination::Undecidable { step } => Some(format!(
                "{marker} {step} produced no decodable decision after {} attempts",
                self.limits.decode_retries + 1
            )),
            Termination::Cancelled => Some(format!("{marker} cancellation requested")),
            Termination::RouterEnded | Termination::Finished => None,
        };
        match note {
            Some(note) => {
                warn!(
                    thread_id = %state.thread_id(),
                    termination = marker,
                    iteration = state.iteration(),
                    "Routing loop stopped early"
                );
                state.note(CONTROLLER, note);
            }
            None => info!(
                thread_id = %state.thread_id(),
                termination = marker,
                iteration = state.iteration(),
                messages = state.messages().len(),
                "Routing loop terminated"
            ),
        }
        state.set_termination(termination.clone());
        events.emit(LoopEvent::Terminated {
            termination: termination.clone(),
        });
        termination
    }
}

struct Emitter<'a>(Option<&'a EventSender>);

impl Emitter<'_> {
    fn emit(&self, event: LoopEvent) {
        if let Some(tx) = self.0 {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }
}
