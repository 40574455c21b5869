use async_trait::async_trait;
use tracing::info;

use crate::{
    error::{FlowError, Result},
    sanction::SanctionBuilder,
    session::{Session, Stage},
    task::{ActionTag, Inbound, NextAction, Payload, StageTask, TaskResult},
};

/// Issues the sanction letter for an approved application
pub struct SanctionTask {
    builder: SanctionBuilder,
}

impl SanctionTask {
    pub fn new(builder: SanctionBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl StageTask for SanctionTask {
    fn stage(&self) -> Stage {
        Stage::GeneratingSanction
    }

    async fn run(&self, session: &mut Session, _event: &Inbound) -> Result<TaskResult> {
        info!(session_id = %session.id, "running task: sanction");

        let stage = Stage::GeneratingSanction;
        let customer = session
            .customer
            .as_ref()
            .ok_or_else(|| FlowError::missing(stage, "customer"))?;
        let terms = session
            .loan_terms
            .as_ref()
            .ok_or_else(|| FlowError::missing(stage, "loan_terms"))?;
        let credit = session
            .underwriting_result
            .as_ref()
            .filter(|result| result.is_approved())
            .map(|result| &result.credit_info)
            .ok_or_else(|| FlowError::missing(stage, "approved underwriting_result"))?;

        let record = self.builder.build(customer, terms, credit).await?;
        let status = format!("Sanction {} issued", record.reference_number());
        let payload = Payload {
            document_available: Some(true),
            document_path: Some(record.document.to_string()),
            sanction_result: Some(record.clone()),
            ..Payload::default()
        };
        let response = record.summary();
        session.sanction_result = Some(record);

        Ok(TaskResult::new(response, NextAction::End)
            .with_action(ActionTag::LoanApproved)
            .with_payload(payload)
            .with_status(status))
    }
}
