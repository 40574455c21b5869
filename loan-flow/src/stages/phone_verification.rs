use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    customer::CustomerDirectory,
    error::Result,
    format::{humanize, inr},
    phrase::PhraseInterpreter,
    session::{Session, Stage},
    task::{ActionTag, Inbound, NextAction, Payload, StageTask, TaskResult},
};

/// Looks the customer up by phone number
pub struct PhoneVerificationTask {
    directory: Arc<dyn CustomerDirectory>,
    interpreter: Arc<dyn PhraseInterpreter>,
}

impl PhoneVerificationTask {
    pub fn new(directory: Arc<dyn CustomerDirectory>, interpreter: Arc<dyn PhraseInterpreter>) -> Self {
        Self {
            directory,
            interpreter,
        }
    }
}

#[async_trait]
impl StageTask for PhoneVerificationTask {
    fn stage(&self) -> Stage {
        Stage::AwaitingPhone
    }

    async fn run(&self, session: &mut Session, event: &Inbound) -> Result<TaskResult> {
        info!(session_id = %session.id, "running task: phone verification");

        let phone = self.interpreter.normalize_phone(&event.text);
        let Some(customer) = self.directory.lookup_customer(&phone).await? else {
            warn!(session_id = %session.id, phone = %phone, "No customer for phone number");
            return Ok(TaskResult::new(
                "I couldn't find an account with that mobile number. \
                 Please check the number and try again.",
                NextAction::WaitForInput,
            )
            .with_action(ActionTag::RetryPhone)
            .with_status("Phone lookup failed - waiting for another number"));
        };

        let limit = customer.pre_approved_limit;
        let response = format!(
            "Thank you, {}! ✅ I've verified your details.\n\n\
             Great news! You have a pre-approved personal loan limit of {} ({}).\n\n\
             How much would you like to borrow? You can enter amounts like \
             '2 lakh', '250000' or '50k'.",
            customer.name,
            inr(limit),
            humanize(limit)
        );
        let status = format!("Verified customer {} - waiting for loan amount", customer.name);
        let payload = Payload {
            customer_data: Some(customer.clone()),
            pre_approved_limit: Some(limit),
            ..Payload::default()
        };
        session.customer = Some(customer);

        Ok(TaskResult::new(response, NextAction::GoTo(Stage::AwaitingLoanAmount))
            .with_action(ActionTag::RequestAmount)
            .with_payload(payload)
            .with_status(status))
    }
}
