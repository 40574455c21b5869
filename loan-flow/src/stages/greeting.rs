use async_trait::async_trait;
use tracing::info;

use crate::{
    error::Result,
    session::{Session, Stage},
    task::{ActionTag, Inbound, NextAction, StageTask, TaskResult},
};

/// Opens the conversation and asks for the registered phone number
pub struct GreetingTask {
    lender_name: String,
}

impl GreetingTask {
    pub fn new(lender_name: impl Into<String>) -> Self {
        Self {
            lender_name: lender_name.into(),
        }
    }
}

#[async_trait]
impl StageTask for GreetingTask {
    fn stage(&self) -> Stage {
        Stage::Initial
    }

    async fn run(&self, session: &mut Session, _event: &Inbound) -> Result<TaskResult> {
        info!(session_id = %session.id, "running task: greeting");

        let response = format!(
            "Hi! 👋 Welcome to {}. I'm your personal loan assistant.\n\n\
             I can help you get an instant personal loan in a few minutes.\n\n\
             To get started, please share your registered mobile number.",
            self.lender_name
        );
        Ok(TaskResult::new(response, NextAction::GoTo(Stage::AwaitingPhone))
            .with_action(ActionTag::RequestPhone)
            .with_status("Greeted customer - waiting for phone number"))
    }
}
