use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    calculator::{self, LoanTerms, SUPPORTED_TENURES},
    error::{FlowError, Result},
    format::{inr, inr_decimal},
    phrase::PhraseInterpreter,
    session::{Session, Stage},
    task::{ActionTag, Inbound, NextAction, Payload, StageTask, TaskResult},
};

pub struct TenureSelectionTask {
    interpreter: Arc<dyn PhraseInterpreter>,
}

impl TenureSelectionTask {
    pub fn new(interpreter: Arc<dyn PhraseInterpreter>) -> Self {
        Self { interpreter }
    }
}

fn terms_message(terms: &LoanTerms) -> String {
    format!(
        "Here's a summary of your loan offer:\n\n\
         Loan Amount: {}\n\
         Tenure: {} months ({} years)\n\
         Interest Rate: {}% p.a.\n\
         Monthly EMI: {}\n\
         Processing Fee: {}\n\
         Total Interest: {}\n\
         Total Amount Payable: {}\n\n\
         Would you like to proceed with these terms? (yes/no)",
        inr(terms.loan_amount),
        terms.tenure_months,
        terms.tenure_years,
        terms.interest_rate,
        inr_decimal(terms.emi),
        inr_decimal(terms.processing_fee),
        inr_decimal(terms.total_interest),
        inr_decimal(terms.total_payable),
    )
}

#[async_trait]
impl StageTask for TenureSelectionTask {
    fn stage(&self) -> Stage {
        Stage::AwaitingTenure
    }

    async fn run(&self, session: &mut Session, event: &Inbound) -> Result<TaskResult> {
        info!(session_id = %session.id, "running task: tenure selection");

        let Some(tenure) = self.interpreter.parse_tenure(&event.text) else {
            warn!(session_id = %session.id, "Tenure not understood");
            return Ok(TaskResult::new(
                "I couldn't understand the tenure. Please enter it like '36 months' or '3 years'.",
                NextAction::WaitForInput,
            )
            .with_action(ActionTag::TenureUnclear)
            .with_status("Tenure not understood - waiting for tenure"));
        };
        debug!(session_id = %session.id, tenure, "Parsed tenure");

        if !SUPPORTED_TENURES.contains(&tenure) {
            warn!(session_id = %session.id, tenure, "Unsupported tenure");
            return Ok(TaskResult::new(
                format!(
                    "We offer tenures of 12, 24, 36, 48 or 60 months. {} months isn't available, \
                     please choose one of those.",
                    tenure
                ),
                NextAction::WaitForInput,
            )
            .with_action(ActionTag::InvalidTenure)
            .with_status("Unsupported tenure - waiting for tenure"));
        }

        let amount = session
            .loan_amount
            .ok_or_else(|| FlowError::missing(Stage::AwaitingTenure, "loan_amount"))?;
        let terms = calculator::loan_terms(amount, tenure);
        let response = terms_message(&terms);
        let status = format!(
            "Terms computed for {} over {} months - waiting for confirmation",
            amount, tenure
        );

        session.tenure_months = Some(tenure);
        session.loan_terms = Some(terms.clone());

        Ok(TaskResult::new(response, NextAction::GoTo(Stage::ReviewingTerms))
            .with_action(ActionTag::ShowTerms)
            .with_payload(Payload {
                loan_terms: Some(terms),
                ..Payload::default()
            })
            .with_status(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing;

    fn session_with_amount() -> Session {
        let mut session = Session::new("tenure");
        session.stage = Stage::AwaitingTenure;
        session.customer = Some(testing::priya());
        session.loan_amount = Some(250_000);
        session
    }

    #[tokio::test]
    async fn supported_tenure_computes_terms() {
        let task = TenureSelectionTask::new(testing::deps().interpreter);
        let mut session = session_with_amount();
        let result = task.run(&mut session, &Inbound::text("3 years")).await.unwrap();

        assert_eq!(result.next_action, NextAction::GoTo(Stage::ReviewingTerms));
        assert_eq!(result.action, Some(ActionTag::ShowTerms));
        assert_eq!(session.tenure_months, Some(36));
        let terms = session.loan_terms.as_ref().unwrap();
        assert_eq!(terms.interest_rate, 11.49);
        assert_eq!(result.payload.loan_terms.as_ref(), Some(terms));
    }

    #[tokio::test]
    async fn unsupported_tenure_is_rejected_without_mutation() {
        let task = TenureSelectionTask::new(testing::deps().interpreter);
        let mut session = session_with_amount();

        let invalid = task.run(&mut session, &Inbound::text("18 months")).await.unwrap();
        assert_eq!(invalid.action, Some(ActionTag::InvalidTenure));
        assert_eq!(invalid.next_action, NextAction::WaitForInput);

        let unclear = task.run(&mut session, &Inbound::text("whenever")).await.unwrap();
        assert_eq!(unclear.action, Some(ActionTag::TenureUnclear));

        assert!(session.tenure_months.is_none());
        assert!(session.loan_terms.is_none());
    }

    #[tokio::test]
    async fn half_year_tenure_asks_again() {
        let task = TenureSelectionTask::new(testing::deps().interpreter);
        let mut session = session_with_amount();

        let result = task.run(&mut session, &Inbound::text("2.5 years")).await.unwrap();
        assert_eq!(result.action, Some(ActionTag::TenureUnclear));
        assert_eq!(result.next_action, NextAction::WaitForInput);
        assert!(session.tenure_months.is_none());
    }
}
