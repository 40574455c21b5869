use async_trait::async_trait;
use tracing::info;

use crate::{
    error::{FlowError, Result},
    format::inr,
    session::{Session, Stage},
    task::{ActionTag, Inbound, NextAction, Payload, StageTask, TaskResult},
    underwriting::{Application, DecisionReason, Outcome, RejectionDetail, Underwriter},
};

/// Runs the eligibility rules on the accepted terms
pub struct UnderwritingTask {
    underwriter: Underwriter,
}

impl UnderwritingTask {
    pub fn new(underwriter: Underwriter) -> Self {
        Self { underwriter }
    }
}

#[async_trait]
impl StageTask for UnderwritingTask {
    fn stage(&self) -> Stage {
        Stage::ProcessingUnderwriting
    }

    async fn run(&self, session: &mut Session, _event: &Inbound) -> Result<TaskResult> {
        info!(session_id = %session.id, "running task: underwriting");

        let stage = Stage::ProcessingUnderwriting;
        let customer = session
            .customer
            .as_ref()
            .ok_or_else(|| FlowError::missing(stage, "customer"))?;
        let terms = session
            .loan_terms
            .as_ref()
            .ok_or_else(|| FlowError::missing(stage, "loan_terms"))?;

        let result = self
            .underwriter
            .evaluate(Application {
                customer,
                amount: terms.loan_amount,
                tenure_months: terms.tenure_months,
                interest_rate: terms.interest_rate,
                document: session.uploaded_document_ref.as_ref(),
            })
            .await?;
        info!(
            session_id = %session.id,
            reason = ?result.reason(),
            credit_score = result.credit_info.credit_score,
            "Underwriting decided"
        );

        let message = result.message.clone();
        let credit_info = result.credit_info.clone();
        let task_result = match &result.outcome {
            Outcome::Approved { .. } => TaskResult::new(
                message,
                NextAction::GoToAndExecute(Stage::GeneratingSanction),
            )
            .with_payload(Payload {
                credit_info: Some(credit_info),
                underwriting_result: Some(result.clone()),
                ..Payload::default()
            })
            .with_status("Underwriting approved - generating sanction"),
            Outcome::NeedsDocument { .. } => TaskResult::new(
                format!("{message}\n\nPlease upload your latest salary slip to continue."),
                NextAction::GoTo(Stage::AwaitingSalarySlip),
            )
            .with_action(ActionTag::RequestDocument)
            .with_payload(Payload {
                credit_info: Some(credit_info),
                underwriting_result: Some(result.clone()),
                ..Payload::default()
            })
            .with_status("Salary slip required - waiting for upload"),
            Outcome::Rejected { reason, detail } => {
                let (hint, max_eligible_amount) = match (reason, detail) {
                    (
                        DecisionReason::ExceedsLimit,
                        RejectionDetail::Limit { max_eligible_amount },
                    ) => (
                        format!(
                            "You can apply for up to {}. Use the reset option to start a new application.",
                            inr(*max_eligible_amount)
                        ),
                        Some(*max_eligible_amount),
                    ),
                    _ => (
                        "You can reapply after 3 months. Use the reset option to start a new application."
                            .to_string(),
                        None,
                    ),
                };
                TaskResult::new(format!("{message}\n\n{hint}"), NextAction::End)
                    .with_action(ActionTag::LoanRejected)
                    .with_payload(Payload {
                        credit_info: Some(credit_info),
                        rejection_reason: Some(*reason),
                        max_eligible_amount,
                        ..Payload::default()
                    })
                    .with_status(format!("Loan rejected: {:?}", reason))
            }
        };

        session.underwriting_result = Some(result);
        Ok(task_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        calculator::loan_terms,
        credit::FixedBureau,
        customer::demo_customers,
        stages::testing,
        underwriting::UnderwritingPolicy,
    };
    use std::sync::Arc;

    fn session_for(customer_index: usize, amount: u64, tenure: u32) -> Session {
        let mut session = Session::new("uw");
        session.stage = Stage::ProcessingUnderwriting;
        session.customer = Some(demo_customers().remove(customer_index));
        session.loan_amount = Some(amount);
        session.tenure_months = Some(tenure);
        session.loan_terms = Some(loan_terms(amount, tenure));
        session
    }

    fn task() -> UnderwritingTask {
        UnderwritingTask::new(testing::deps().underwriter)
    }

    #[tokio::test]
    async fn approval_chains_into_sanction() {
        let mut session = session_for(1, 250_000, 36);
        let result = task().run(&mut session, &Inbound::default()).await.unwrap();
        assert_eq!(result.next_action, NextAction::GoToAndExecute(Stage::GeneratingSanction));
        assert!(session.underwriting_result.as_ref().unwrap().is_approved());
        assert!(result.payload.credit_info.is_some());
    }

    #[tokio::test]
    async fn above_limit_without_slip_requests_document() {
        let mut session = session_for(1, 500_000, 36);
        let result = task().run(&mut session, &Inbound::default()).await.unwrap();
        assert_eq!(result.next_action, NextAction::GoTo(Stage::AwaitingSalarySlip));
        assert_eq!(result.action, Some(ActionTag::RequestDocument));
        assert!(result.response.ends_with("Please upload your latest salary slip to continue."));
    }

    #[tokio::test]
    async fn exceeding_twice_the_limit_quotes_max_eligible() {
        let mut session = session_for(1, 600_001, 36);
        let result = task().run(&mut session, &Inbound::default()).await.unwrap();
        assert_eq!(result.next_action, NextAction::End);
        assert_eq!(result.action, Some(ActionTag::LoanRejected));
        assert_eq!(result.payload.rejection_reason, Some(DecisionReason::ExceedsLimit));
        assert_eq!(result.payload.max_eligible_amount, Some(600_000));
        assert!(result.response.contains("You can apply for up to ₹600,000"));
    }

    #[tokio::test]
    async fn low_score_suggests_reapplying() {
        // Amit has a 680 score
        let mut session = session_for(2, 100_000, 12);
        let result = task().run(&mut session, &Inbound::default()).await.unwrap();
        assert_eq!(result.payload.rejection_reason, Some(DecisionReason::CreditScoreLow));
        assert!(result.payload.max_eligible_amount.is_none());
        assert!(result.response.contains("reapply after 3 months"));
        assert!(result.response.contains("Use the reset option"));
        assert!(!result.response.contains("Type 'reset'"));
    }

    #[tokio::test]
    async fn bureau_offset_can_push_score_under_minimum() {
        let underwriter = Underwriter::new(Arc::new(FixedBureau::new(-60)), UnderwritingPolicy::default());
        let mut session = session_for(1, 100_000, 12);
        let result = UnderwritingTask::new(underwriter)
            .run(&mut session, &Inbound::default())
            .await
            .unwrap();
        assert_eq!(result.payload.rejection_reason, Some(DecisionReason::CreditScoreLow));
    }

    #[tokio::test]
    async fn missing_terms_is_an_error() {
        let mut session = session_for(1, 250_000, 36);
        session.loan_terms = None;
        let err = task().run(&mut session, &Inbound::default()).await.unwrap_err();
        assert!(matches!(err, FlowError::MissingSessionData { field: "loan_terms", .. }));
        assert!(session.underwriting_result.is_none());
    }
}
