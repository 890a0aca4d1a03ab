use std::time::Duration;
use switchyard_common::{Result, SwitchyardError};
use switchyard_llm::{LlmClient, LlmRequest};
use tracing::debug;

/// One bounded round-trip to the decision source, returning the raw reply text.
pub(crate) async fn consult(
    llm: &dyn LlmClient,
    request: LlmRequest,
    timeout: Duration,
    step: &str,
) -> Result<String> {
    debug!(step, model = llm.model_name(), "Consulting decision source");
    match tokio::time::timeout(timeout, llm.complete(request)).await {
        Ok(response) => Ok(response?.content),
        Err(_) => Err(SwitchyardError::Timeout {
            operation: format!("{step} decision"),
            after_ms: timeout.as_millis() as u64,
        }),
    }
}
