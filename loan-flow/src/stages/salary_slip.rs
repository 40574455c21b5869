use async_trait::async_trait;
use tracing::info;

use crate::{
    error::Result,
    session::{Session, Stage},
    task::{ActionTag, Inbound, NextAction, StageTask, TaskResult},
};

/// Holds the conversation until a salary slip reference arrives
pub struct SalarySlipTask;

#[async_trait]
impl StageTask for SalarySlipTask {
    fn stage(&self) -> Stage {
        Stage::AwaitingSalarySlip
    }

    async fn run(&self, session: &mut Session, event: &Inbound) -> Result<TaskResult> {
        info!(session_id = %session.id, "running task: salary slip");

        match &event.document {
            Some(document) => {
                info!(session_id = %session.id, document = %document, "Salary slip received");
                session.uploaded_document_ref = Some(document.clone());
                Ok(TaskResult::new(
                    "Thank you! I've received your salary slip. Verifying your details now.",
                    NextAction::GoToAndExecute(Stage::ProcessingUnderwriting),
                )
                .with_status(format!("Salary slip {} received - re-running underwriting", document)))
            }
            None => Ok(TaskResult::new(
                "I'm still waiting for your salary slip. Please upload it using the upload button.",
                NextAction::WaitForInput,
            )
            .with_action(ActionTag::AwaitingUpload)
            .with_status("Waiting for salary slip upload")),
        }
    }
}
