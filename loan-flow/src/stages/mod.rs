//! One task per conversation stage.
//!
//! Tasks never talk to each other directly. Everything they share lives on
//! the [`Session`](crate::session::Session) and in [`FlowDependencies`].

mod completed;
mod greeting;
mod loan_amount;
mod phone_verification;
mod salary_slip;
mod sanction;
mod tenure_selection;
mod terms_review;
mod underwriting;

use std::sync::Arc;

pub use completed::CompletedTask;
pub use greeting::GreetingTask;
pub use loan_amount::LoanAmountTask;
pub use phone_verification::PhoneVerificationTask;
pub use salary_slip::SalarySlipTask;
pub use sanction::SanctionTask;
pub use tenure_selection::TenureSelectionTask;
pub use terms_review::TermsReviewTask;
pub use underwriting::UnderwritingTask;

use crate::{
    config::AmountLimits,
    customer::CustomerDirectory,
    flow::{LoanFlow, LoanFlowBuilder},
    phrase::PhraseInterpreter,
    sanction::SanctionBuilder,
    underwriting::Underwriter,
};

/// Collaborators shared by the stage tasks
#[derive(Clone)]
pub struct FlowDependencies {
    pub directory: Arc<dyn CustomerDirectory>,
    pub interpreter: Arc<dyn PhraseInterpreter>,
    pub underwriter: Underwriter,
    pub sanction_builder: SanctionBuilder,
    pub limits: AmountLimits,
    /// Name used in the greeting
    pub lender_name: String,
}

/// Registers a task for every stage.
pub fn standard_flow(deps: FlowDependencies) -> LoanFlow {
    LoanFlowBuilder::new()
        .add_task(Arc::new(GreetingTask::new(deps.lender_name.clone())))
        .add_task(Arc::new(PhoneVerificationTask::new(
            deps.directory.clone(),
            deps.interpreter.clone(),
        )))
        .add_task(Arc::new(LoanAmountTask::new(
            deps.interpreter.clone(),
            deps.limits.clone(),
        )))
        .add_task(Arc::new(TenureSelectionTask::new(deps.interpreter.clone())))
        .add_task(Arc::new(TermsReviewTask::new(deps.interpreter.clone())))
        .add_task(Arc::new(SalarySlipTask))
        .add_task(Arc::new(UnderwritingTask::new(deps.underwriter)))
        .add_task(Arc::new(SanctionTask::new(deps.sanction_builder)))
        .add_task(Arc::new(CompletedTask))
        .build()
}
