//! Persistence of task state between runs, keyed by thread id.

use async_trait::async_trait;
use std::collections::HashMap;
use switchyard_common::{Result, TaskState};
use tokio::sync::RwLock;

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn load(&self, thread_id: &str) -> Result<Option<TaskState>>;

    /// Insert or replace the state stored under its thread id.
    async fn save(&self, state: &TaskState) -> Result<()>;

    /// Known thread ids, sorted.
    async fn list(&self) -> Result<Vec<String>>;
}

/// Process-local store; state is lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, TaskState>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn load(&self, thread_id: &str) -> Result<Option<TaskState>> {
        Ok(self.tasks.read().await.get(thread_id).cloned())
    }

    async fn save(&self, state: &TaskState) -> Result<()> {
        self.tasks
            .write()
            .await
            .insert(state.thread_id().to_string(), state.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.tasks.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
