use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    calculator::{self, TenureSuggestions},
    config::AmountLimits,
    error::{FlowError, Result},
    format::{inr, inr_decimal},
    phrase::PhraseInterpreter,
    session::{Session, Stage},
    task::{ActionTag, Inbound, NextAction, Payload, StageTask, TaskResult},
};

/// Validates the requested amount and suggests tenures for it
pub struct LoanAmountTask {
    interpreter: Arc<dyn PhraseInterpreter>,
    limits: AmountLimits,
}

impl LoanAmountTask {
    pub fn new(interpreter: Arc<dyn PhraseInterpreter>, limits: AmountLimits) -> Self {
        Self { interpreter, limits }
    }

    fn rejection(&self, session: &Session, response: String, action: ActionTag) -> TaskResult {
        warn!(session_id = %session.id, action = ?action, "Loan amount not accepted");
        TaskResult::new(response, NextAction::WaitForInput)
            .with_action(action)
            .with_status("Loan amount not accepted - waiting for another amount")
    }
}

fn suggestions_message(amount: u64, suggestions: &TenureSuggestions) -> String {
    let mut lines = vec![format!(
        "Perfect! You've requested {}.\n\nHere are your repayment options:",
        inr(amount)
    )];
    for option in &suggestions.all_options {
        let marker = if option.tenure_months == suggestions.recommended.tenure_months {
            " ⭐ Recommended"
        } else {
            ""
        };
        lines.push(format!(
            "• {} months @ {}% p.a. - EMI {}{}",
            option.tenure_months,
            option.interest_rate,
            inr_decimal(option.emi),
            marker
        ));
    }
    if !suggestions.recommended_is_comfortable {
        lines.push(
            "\nNote: every option is above 35% of your monthly salary, so we've suggested \
             the longest tenure to keep your EMI as low as possible."
                .to_string(),
        );
    }
    lines.push("\nWhich tenure would you prefer? (e.g. '36 months' or '3 years')".to_string());
    lines.join("\n")
}

#[async_trait]
impl StageTask for LoanAmountTask {
    fn stage(&self) -> Stage {
        Stage::AwaitingLoanAmount
    }

    async fn run(&self, session: &mut Session, event: &Inbound) -> Result<TaskResult> {
        info!(session_id = %session.id, "running task: loan amount");

        let Some(amount) = self.interpreter.parse_amount(&event.text) else {
            return Ok(self.rejection(
                session,
                "I couldn't understand the amount. Please enter it like '2 lakh', \
                 '250000' or '50k'."
                    .to_string(),
                ActionTag::AmountUnclear,
            ));
        };
        debug!(session_id = %session.id, amount, "Parsed loan amount");

        if amount < self.limits.min_amount {
            return Ok(self.rejection(
                session,
                format!(
                    "The minimum loan amount is {}. Please enter a higher amount.",
                    inr(self.limits.min_amount)
                ),
                ActionTag::AmountTooLow,
            ));
        }
        if amount > self.limits.max_amount {
            return Ok(self.rejection(
                session,
                format!(
                    "The maximum loan amount is {}. Please enter a lower amount.",
                    inr(self.limits.max_amount)
                ),
                ActionTag::AmountTooHigh,
            ));
        }

        let salary = session
            .customer
            .as_ref()
            .map(|customer| customer.monthly_salary)
            .ok_or_else(|| FlowError::missing(Stage::AwaitingLoanAmount, "customer"))?;
        let suggestions = calculator::suggest_tenures(salary, amount);
        session.loan_amount = Some(amount);

        let response = suggestions_message(amount, &suggestions);
        let status = format!(
            "Loan amount {} accepted - recommended {} months",
            amount, suggestions.recommended.tenure_months
        );
        let payload = Payload {
            loan_amount: Some(amount),
            recommended_tenure: Some(suggestions.recommended.clone()),
            suggestions: Some(suggestions.all_options),
            ..Payload::default()
        };
        Ok(TaskResult::new(response, NextAction::GoTo(Stage::AwaitingTenure))
            .with_action(ActionTag::RequestTenure)
            .with_payload(payload)
            .with_status(status))
    }
}
