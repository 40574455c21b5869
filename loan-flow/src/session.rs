use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    calculator::LoanTerms, customer::Customer, sanction::SanctionRecord,
    underwriting::UnderwritingResult,
};

/// Conversation stage. Exactly one is active per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initial,
    AwaitingPhone,
    AwaitingLoanAmount,
    AwaitingTenure,
    ReviewingTerms,
    AwaitingSalarySlip,
    ProcessingUnderwriting,
    GeneratingSanction,
    Completed,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Initial,
        Stage::AwaitingPhone,
        Stage::AwaitingLoanAmount,
        Stage::AwaitingTenure,
        Stage::ReviewingTerms,
        Stage::AwaitingSalarySlip,
        Stage::ProcessingUnderwriting,
        Stage::GeneratingSanction,
        Stage::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::AwaitingPhone => "awaiting_phone",
            Stage::AwaitingLoanAmount => "awaiting_loan_amount",
            Stage::AwaitingTenure => "awaiting_tenure",
            Stage::ReviewingTerms => "reviewing_terms",
            Stage::AwaitingSalarySlip => "awaiting_salary_slip",
            Stage::ProcessingUnderwriting => "processing_underwriting",
            Stage::GeneratingSanction => "generating_sanction",
            Stage::Completed => "completed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle naming an uploaded document. The core passes it through
/// unexamined apart from salary extraction during underwriting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRef(pub String);

impl DocumentRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of a single loan conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub stage: Stage,
    pub customer: Option<Customer>,
    pub loan_amount: Option<u64>,
    pub tenure_months: Option<u32>,
    pub loan_terms: Option<LoanTerms>,
    pub uploaded_document_ref: Option<DocumentRef>,
    pub underwriting_result: Option<UnderwritingResult>,
    pub sanction_result: Option<SanctionRecord>,
    /// Description of the last transition, for logs and debugging
    pub status_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            stage: Stage::Initial,
            customer: None,
            loan_amount: None,
            tenure_months: None,
            loan_terms: None,
            uploaded_document_ref: None,
            underwriting_result: None,
            sanction_result: None,
            status_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Return to `initial` and drop everything collected so far.
    pub fn reset(&mut self) {
        self.stage = Stage::Initial;
        self.customer = None;
        self.loan_amount = None;
        self.tenure_months = None;
        self.loan_terms = None;
        self.uploaded_document_ref = None;
        self.underwriting_result = None;
        self.sanction_result = None;
        self.status_message = None;
        self.updated_at = Utc::now();
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
