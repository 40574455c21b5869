use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    calculator::{LoanTerms, TenureOption},
    credit::CreditInfo,
    customer::Customer,
    error::Result,
    sanction::SanctionRecord,
    session::{DocumentRef, Session, Stage},
    underwriting::{DecisionReason, UnderwritingResult},
};

/// One inbound event: the user's text plus an optional uploaded document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inbound {
    pub text: String,
    pub document: Option<DocumentRef>,
}

impl Inbound {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            document: None,
        }
    }

    pub fn document(reference: DocumentRef) -> Self {
        Self {
            text: String::new(),
            document: Some(reference),
        }
    }
}

/// Machine-readable tag the host forwards verbatim with each reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTag {
    RequestPhone,
    RetryPhone,
    RequestAmount,
    AmountUnclear,
    AmountTooLow,
    AmountTooHigh,
    RequestTenure,
    TenureUnclear,
    InvalidTenure,
    ShowTerms,
    RestartTerms,
    ClarifyAcceptance,
    RequestDocument,
    AwaitingUpload,
    LoanRejected,
    LoanApproved,
}

/// Structured data attached to a reply. Absent keys are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_data: Option<Customer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_approved_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<TenureOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_tenure: Option<TenureOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_terms: Option<LoanTerms>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_info: Option<CreditInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underwriting_result: Option<UnderwritingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<DecisionReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_eligible_amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanction_result: Option<SanctionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_path: Option<String>,
}

impl Payload {
    /// Overlay `later` on top of `self`; keys set in `later` win.
    pub fn merge(self, later: Payload) -> Payload {
        Payload {
            customer_data: later.customer_data.or(self.customer_data),
            pre_approved_limit: later.pre_approved_limit.or(self.pre_approved_limit),
            loan_amount: later.loan_amount.or(self.loan_amount),
            suggestions: later.suggestions.or(self.suggestions),
            recommended_tenure: later.recommended_tenure.or(self.recommended_tenure),
            loan_terms: later.loan_terms.or(self.loan_terms),
            credit_info: later.credit_info.or(self.credit_info),
            underwriting_result: later.underwriting_result.or(self.underwriting_result),
            rejection_reason: later.rejection_reason.or(self.rejection_reason),
            max_eligible_amount: later.max_eligible_amount.or(self.max_eligible_amount),
            sanction_result: later.sanction_result.or(self.sanction_result),
            document_available: later.document_available.or(self.document_available),
            document_path: later.document_path.or(self.document_path),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Payload::default()
    }
}

/// Defines what should happen after a stage task completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextAction {
    /// Stay on the current stage until the next inbound event
    WaitForInput,
    /// Move to the stage and wait for the next inbound event
    GoTo(Stage),
    /// Move to the stage and run its task within the same event
    GoToAndExecute(Stage),
    /// Move to `completed`
    End,
}

/// Result of a stage task execution
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Response to send to the user
    pub response: String,
    pub next_action: NextAction,
    pub action: Option<ActionTag>,
    pub payload: Payload,
    /// Log-friendly description of what happened
    pub status_message: Option<String>,
}

impl TaskResult {
    pub fn new(response: impl Into<String>, next_action: NextAction) -> Self {
        Self {
            response: response.into(),
            next_action,
            action: None,
            payload: Payload::default(),
            status_message: None,
        }
    }

    pub fn with_action(mut self, action: ActionTag) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_status(mut self, status_message: impl Into<String>) -> Self {
        self.status_message = Some(status_message.into());
        self
    }
}

/// A handler for exactly one conversation stage
#[async_trait]
pub trait StageTask: Send + Sync {
    /// Stage this task handles
    fn stage(&self) -> Stage;

    /// Handle one event. Tasks that reject the input must leave the session untouched.
    async fn run(&self, session: &mut Session, event: &Inbound) -> Result<TaskResult>;
}
