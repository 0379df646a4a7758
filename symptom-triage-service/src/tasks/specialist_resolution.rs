use std::sync::Arc;

use async_trait::async_trait;
use triage_flow::{Context, NextAction, Result, Task, TaskResult};

use super::session_keys;
use crate::resolution::ResolutionCascade;

pub struct SpecialistResolutionTask {
    cascade: Arc<ResolutionCascade>,
}

impl SpecialistResolutionTask {
    pub fn new(cascade: Arc<ResolutionCascade>) -> Self {
        Self { cascade }
    }
}

#[async_trait]
impl Task for SpecialistResolutionTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let text: String = context.require(session_keys::EXTRACTED_TEXT).await?;
        let answer = self.cascade.analyze(&text).await?;

        let status = format!("Resolved specialist: {}", answer.specialist);
        context.set(session_keys::RESOLUTION, answer).await;

        Ok(TaskResult::new_with_status(
            None,
            NextAction::Continue,
            Some(status),
        ))
    }
}
