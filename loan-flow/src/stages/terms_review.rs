use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::{
    error::Result,
    phrase::{PhraseInterpreter, YesNo},
    session::{Session, Stage},
    task::{ActionTag, Inbound, NextAction, StageTask, TaskResult},
};

/// Waits for the customer to accept or decline the computed terms
pub struct TermsReviewTask {
    interpreter: Arc<dyn PhraseInterpreter>,
}

impl TermsReviewTask {
    pub fn new(interpreter: Arc<dyn PhraseInterpreter>) -> Self {
        Self { interpreter }
    }
}

#[async_trait]
impl StageTask for TermsReviewTask {
    fn stage(&self) -> Stage {
        Stage::ReviewingTerms
    }

    async fn run(&self, session: &mut Session, event: &Inbound) -> Result<TaskResult> {
        info!(session_id = %session.id, "running task: terms review");

        let answer = self.interpreter.classify_yesno(&event.text);
        info!(session_id = %session.id, answer = ?answer, "Terms answer classified");

        match answer {
            YesNo::Affirmative => Ok(TaskResult::new(
                "Great! Let me check your eligibility.",
                NextAction::GoToAndExecute(Stage::ProcessingUnderwriting),
            )
            .with_status("Terms accepted - proceeding to underwriting")),
            YesNo::Negative => {
                session.loan_amount = None;
                session.tenure_months = None;
                session.loan_terms = None;
                Ok(TaskResult::new(
                    "No problem! Let's adjust your loan. How much would you like to borrow?",
                    NextAction::GoTo(Stage::AwaitingLoanAmount),
                )
                .with_action(ActionTag::RestartTerms)
                .with_status("Terms declined - waiting for a new loan amount"))
            }
            YesNo::Ambiguous => Ok(TaskResult::new(
                "Sorry, I didn't catch that. Would you like to proceed with these terms? \
                 Please reply 'yes' or 'no'.",
                NextAction::WaitForInput,
            )
            .with_action(ActionTag::ClarifyAcceptance)
            .with_status("Terms answer unclear - waiting for yes or no")),
        }
    }
}
