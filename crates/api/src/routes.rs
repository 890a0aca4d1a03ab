//! HTTP route handlers for the API.

use crate::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use switchyard_common::{Message, TaskState, Termination};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub specialists: Vec<String>,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        specialists: state.controller.registry().ids().map(String::from).collect(),
    })
}

/// Body of `POST /api/v1/tasks`.
///
/// Without `thread_id` a new thread is started from `request`. With a known
/// `thread_id` the stored task is resumed and `request` is ignored.
#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub request: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub thread_id: String,
    pub running: bool,
    pub termination: Option<Termination>,
    /// Content of the latest specialist result
    pub answer: Option<String>,
    pub iteration: u32,
    pub visit_counts: BTreeMap<String, u32>,
    pub messages: Vec<Message>,
}

impl TaskResponse {
    fn from_state(task: &TaskState, running: bool) -> Self {
        Self {
            thread_id: task.thread_id().to_string(),
            running,
            termination: task.termination().cloned(),
            answer: task.last_specialist_result().map(|m| m.content.clone()),
            iteration: task.iteration(),
            visit_counts: task.visit_counts().clone(),
            messages: task.messages().to_vec(),
        }
    }
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    pub code: &'static str,
}

impl ErrorResponse {
    fn new(status: StatusCode, code: &'static str, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            code,
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", error.to_string())
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Start or resume a task and run it until the loop terminates.
///
/// The thread is claimed before its state is loaded and released only after
/// the final save, so concurrent requests never run on a stale snapshot.
pub async fn run_task(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TaskRequest>,
) -> Result<Json<TaskResponse>, ErrorResponse> {
    let thread_id = body
        .thread_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let Some(token) = state.begin_run(&thread_id).await else {
        return Err(ErrorResponse::new(
            StatusCode::CONFLICT,
            "TASK_RUNNING",
            format!("task '{thread_id}' is already running"),
        ));
    };

    let result = run_claimed(&state, &thread_id, body.request, &token).await;
    state.end_run(&thread_id).await;
    result.map(Json)
}

async fn run_claimed(
    state: &AppState,
    thread_id: &str,
    request: Option<String>,
    token: &CancellationToken,
) -> Result<TaskResponse, ErrorResponse> {
    let mut task = match state
        .store
        .load(thread_id)
        .await
        .map_err(ErrorResponse::internal)?
    {
        Some(existing) => {
            info!(thread_id = %thread_id, "Resuming stored task");
            existing
        }
        None => {
            let request = request.filter(|r| !r.trim().is_empty()).ok_or_else(|| {
                ErrorResponse::new(
                    StatusCode::BAD_REQUEST,
                    "MISSING_REQUEST",
                    "a request is required to start a new task",
                )
            })?;
            info!(
                thread_id = %thread_id,
                content_preview = %request.chars().take(50).collect::<String>(),
                "Starting task"
            );
            TaskState::new(thread_id, request)
        }
    };

    let outcome = match state.store.save(&task).await {
        Ok(()) => state.controller.run(&mut task, token).await,
        Err(e) => Err(e),
    };

    // Persist whatever the run produced, including a fatal note.
    state.store.save(&task).await.map_err(ErrorResponse::internal)?;

    match outcome {
        Ok(termination) => {
            info!(thread_id = %thread_id, termination = termination.marker(), "Task run complete");
            Ok(TaskResponse::from_state(&task, false))
        }
        Err(e) => {
            error!(thread_id = %thread_id, error = %e, "Task run failed");
            Err(ErrorResponse::new(
                StatusCode::BAD_GATEWAY,
                "DECISION_SOURCE_ERROR",
                format!("task '{thread_id}' stopped: {e}"),
            ))
        }
    }
}

/// Fetch the stored state of a task.
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<Json<TaskResponse>, ErrorResponse> {
    let task = state
        .store
        .load(&thread_id)
        .await
        .map_err(ErrorResponse::internal)?
        .ok_or_else(|| {
            ErrorResponse::new(
                StatusCode::NOT_FOUND,
                "TASK_NOT_FOUND",
                format!("no task '{thread_id}'"),
            )
        })?;
    let running = state.is_running(&thread_id).await;
    Ok(Json(TaskResponse::from_state(&task, running)))
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub thread_ids: Vec<String>,
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TaskListResponse>, ErrorResponse> {
    let thread_ids = state.store.list().await.map_err(ErrorResponse::internal)?;
    Ok(Json(TaskListResponse { thread_ids }))
}

/// Signal cancellation; the loop stops at its next step boundary.
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<StatusCode, ErrorResponse> {
    if state.cancel(&thread_id).await {
        info!(thread_id = %thread_id, "Cancellation requested");
        Ok(StatusCode::ACCEPTED)
    } else {
        warn!(thread_id = %thread_id, "Cancel requested for a task that is not running");
        Err(ErrorResponse::new(
            StatusCode::NOT_FOUND,
            "TASK_NOT_RUNNING",
            format!("task '{thread_id}' is not running"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_request_deserialization() {
        let start: TaskRequest = serde_json::from_str(r#"{"request": "QPS for example.com"}"#).unwrap();
        assert!(start.thread_id.is_none());
        assert_eq!(start.request.as_deref(), Some("QPS for example.com"));

        let resume: TaskRequest = serde_json::from_str(r#"{"thread_id": "t-1"}"#).unwrap();
        assert_eq!(resume.thread_id.as_deref(), Some("t-1"));
        assert!(resume.request.is_none());
    }

    #[test]
    fn test_task_response_serialization() {
        let mut task = TaskState::new("t-1", "Who owns example.com?");
        task.record_specialist_result("domain-lookup", "Owner: Example Inc.");
        task.set_termination(Termination::Finished);

        let json = serde_json::to_value(TaskResponse::from_state(&task, false)).unwrap();
        assert_eq!(json["thread_id"], "t-1");
        assert_eq!(json["answer"], "Owner: Example Inc.");
        assert_eq!(json["termination"]["kind"], "finished");
        assert_eq!(json["visit_counts"]["domain-lookup"], 1);
        assert_eq!(json["messages"][1]["role"], "specialist-result");
    }

    #[test]
    fn test_error_response_omits_status() {
        let err = ErrorResponse::new(StatusCode::NOT_FOUND, "TASK_NOT_FOUND", "no task 'x'");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "TASK_NOT_FOUND");
        assert!(json.get("status").is_none());
    }
}
