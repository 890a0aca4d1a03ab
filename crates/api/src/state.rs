//! Application state for the API server.

use std::collections::HashMap;
use std::sync::Arc;

use switchyard_router::{InMemoryTaskStore, LoopController, RouterConfig, TaskStore};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Shared application state for the API server.
pub struct AppState {
    pub controller: Arc<LoopController>,

    pub store: Arc<dyn TaskStore>,

    /// Cancellation handles of the runs currently in flight, by thread id
    running: Mutex<HashMap<String, CancellationToken>>,

    /// Server start time (for health checks)
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(controller: LoopController, store: Arc<dyn TaskStore>) -> Self {
        Self {
            controller: Arc::new(controller),
            store,
            running: Mutex::new(HashMap::new()),
            start_time: std::time::Instant::now(),
        }
    }

    /// Build the controller from configuration with an in-memory task store.
    pub fn from_config(config: &RouterConfig) -> switchyard_common::Result<Self> {
        let controller = LoopController::from_config(config)?;
        Ok(Self::new(controller, Arc::new(InMemoryTaskStore::new())))
    }

    /// Mark a thread as running. Returns `None` if a run is already in flight.
    pub async fn begin_run(&self, thread_id: &str) -> Option<CancellationToken> {
        let mut running = self.running.lock().await;
        if running.contains_key(thread_id) {
            return None;
        }
        let token = CancellationToken::new();
        running.insert(thread_id.to_string(), token.clone());
        Some(token)
    }

    pub async fn end_run(&self, thread_id: &str) {
        self.running.lock().await.remove(thread_id);
    }

    pub async fn is_running(&self, thread_id: &str) -> bool {
        self.running.lock().await.contains_key(thread_id)
    }

    /// Signal cancellation of a running thread. Returns false if nothing is running.
    pub async fn cancel(&self, thread_id: &str) -> bool {
        match self.running.lock().await.get(thread_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Get the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
