use async_trait::async_trait;
use tracing::info;

use crate::{
    error::Result,
    session::{Session, Stage},
    task::{Inbound, NextAction, StageTask, TaskResult},
};

/// Absorbing stage: answers every message until the session is reset
pub struct CompletedTask;

#[async_trait]
impl StageTask for CompletedTask {
    fn stage(&self) -> Stage {
        Stage::Completed
    }

    async fn run(&self, session: &mut Session, _event: &Inbound) -> Result<TaskResult> {
        info!(session_id = %session.id, "running task: completed");

        let response = match &session.sanction_result {
            Some(record) => format!(
                "Your loan has already been sanctioned. Your reference number is {}. \
                 Use the reset option if you'd like to start a new application.",
                record.reference_number()
            ),
            None => "This application is closed. Use the reset option to start a new application."
                .to_string(),
        };
        Ok(TaskResult::new(response, NextAction::WaitForInput)
            .with_status("Conversation completed - waiting for reset"))
    }
}
