//! Specialist that always answers with the same text.

use async_trait::async_trait;
use switchyard_common::{Result, Specialist, TaskState};
use tracing::debug;

pub struct StaticSpecialist {
    id: String,
    description: String,
    reply: String,
}

impl StaticSpecialist {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        reply: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl Specialist for StaticSpecialist {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, state: &TaskState) -> Result<String> {
        debug!(specialist = %self.id, thread_id = %state.thread_id(), "Static reply");
        Ok(self.reply.clone())
    }
}
