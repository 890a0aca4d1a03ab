//! HTTP API and command-line front end for the Switchyard router.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /api/v1/tasks` - List known thread ids
//! - `POST /api/v1/tasks` - Start a task, or resume a stored thread
//! - `GET /api/v1/tasks/{thread_id}` - Fetch a task's state
//! - `POST /api/v1/tasks/{thread_id}/cancel` - Cancel a running task
//!
//! ```text
//! Client
//!    │
//!    ▼
//! ┌─────────────────┐
//! │   API (Axum)    │ ◄── This crate
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐      ┌─────────────────┐
//! │ LoopController  │ ───► │   TaskStore     │
//! └─────────────────┘      └─────────────────┘
//! ```

pub mod routes;
pub mod state;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use switchyard_router::RouterConfig;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

/// Load configuration from `path` (or defaults) and apply environment overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RouterConfig> {
    let mut config = match path {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            RouterConfig::from_file(path)?
        }
        None => {
            info!("Using default configuration");
            RouterConfig::default()
        }
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

/// Create the API router with all routes configured.
///
/// `cors_origins` of `None` (or containing `*`) allows any origin.
pub fn create_router(state: Arc<AppState>, cors_origins: Option<Vec<String>>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/tasks", get(routes::list_tasks).post(routes::run_task))
        .route("/api/v1/tasks/{thread_id}", get(routes::get_task))
        .route("/api/v1/tasks/{thread_id}/cancel", post(routes::cancel_task))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: Option<Vec<String>>) -> CorsLayer {
    let allow_origin = match origins {
        Some(list) if !list.iter().any(|o| o == "*") => AllowOrigin::list(
            list.iter()
                .filter_map(|o| HeaderValue::from_str(o).ok())
                .collect::<Vec<_>>(),
        ),
        _ => AllowOrigin::any(),
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server on the given address.
pub async fn serve(
    state: Arc<AppState>,
    addr: SocketAddr,
    cors_origins: Option<Vec<String>>,
) -> anyhow::Result<()> {
    let router = create_router(state, cors_origins);

    info!(%addr, "Starting Switchyard API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
