//! Step events streamed while the loop runs.

use serde::Serialize;
use switchyard_common::Termination;
use tokio::sync::mpsc;

use crate::decision::Outcome;

/// One observable transition of the routing loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoopEvent {
    Routed {
        specialist: String,
        reason: String,
    },
    FallbackApplied {
        step: String,
        rejected: String,
        applied: String,
    },
    ForcedValidation {
        specialist: String,
        visits: u32,
    },
    SpecialistCompleted {
        specialist: String,
        content: String,
    },
    SpecialistFailed {
        specialist: String,
        error: String,
    },
    DecodeRetry {
        step: String,
        attempt: u32,
        error: String,
    },
    Validated {
        outcome: Outcome,
        reason: String,
    },
    Terminated {
        termination: Termination,
    },
}

pub type EventSender = mpsc::UnboundedSender<LoopEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<LoopEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
