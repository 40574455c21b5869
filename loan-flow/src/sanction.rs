use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::{
    calculator::LoanTerms,
    credit::CreditInfo,
    customer::Customer,
    error::Result,
    format::{inr, inr_decimal},
    render::{ArtifactLocator, DocumentRenderer},
};

const TERMS_AND_CONDITIONS: [&str; 8] = [
    "This sanction is valid for 30 days from the date of issue.",
    "Loan disbursal is subject to verification of submitted documents.",
    "Interest will be charged on a reducing balance basis.",
    "No prepayment charges for foreclosure after 6 months.",
    "EMI will be auto-debited from your registered bank account.",
    "Delayed payments will attract penalty charges of 2% per month.",
    "Insurance charges may be applicable as per policy norms.",
    "The company reserves the right to modify terms as per regulatory requirements.",
];

const REQUIRED_DOCUMENTS: [&str; 6] = [
    "PAN Card (verified copy)",
    "Aadhaar Card (verified copy)",
    "Latest 3 months' salary slips",
    "Bank statements for last 6 months",
    "Passport size photographs (2 nos.)",
    "Cancelled cheque / Bank account proof",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanctionSettings {
    pub reference_prefix: String,
    pub lender_name: String,
    pub validity_days: i64,
    pub disbursal_days: i64,
}

impl Default for SanctionSettings {
    fn default() -> Self {
        Self {
            reference_prefix: "SCPL".to_string(),
            lender_name: "Summit Capital".to_string(),
            validity_days: 30,
            disbursal_days: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub name: String,
    pub address: String,
    pub pan: String,
    pub email: String,
}

impl From<&Customer> for CustomerSnapshot {
    fn from(customer: &Customer) -> Self {
        Self {
            name: customer.name.clone(),
            address: customer.address.clone(),
            pan: customer.pan.clone(),
            email: customer.email.clone(),
        }
    }
}

/// Content of a sanction letter, before rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanctionLetter {
    pub reference_number: String,
    pub lender_name: String,
    pub sanction_date: NaiveDate,
    pub validity_date: NaiveDate,
    pub expected_disbursal_date: NaiveDate,
    pub customer: CustomerSnapshot,
    pub loan: LoanTerms,
    pub credit: CreditInfo,
    pub terms: Vec<String>,
    pub documents_required: Vec<String>,
}

/// Issued sanction: the letter plus where its rendered copy lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanctionRecord {
    #[serde(flatten)]
    pub letter: SanctionLetter,
    pub document: ArtifactLocator,
    pub sanctioned_at: DateTime<Utc>,
}

impl SanctionRecord {
    pub fn reference_number(&self) -> &str {
        &self.letter.reference_number
    }

    /// Short chat-friendly summary, independent of the rendered document
    pub fn summary(&self) -> String {
        let letter = &self.letter;
        format!(
            "🎉 Loan Sanctioned Successfully!\n\n\
             Loan Reference: {}\n\
             Amount: {}\n\
             EMI: {} for {} months\n\
             Interest Rate: {}% p.a.\n\n\
             Expected Disbursal: {}\n\
             Valid Until: {}\n\n\
             Next Steps:\n\
             1. Download your sanction letter\n\
             2. Submit required documents\n\
             3. Funds will be disbursed within 48 hours of document verification\n\n\
             Thank you for choosing {}!",
            letter.reference_number,
            inr(letter.loan.loan_amount),
            inr_decimal(letter.loan.emi),
            letter.loan.tenure_months,
            letter.loan.interest_rate,
            letter.expected_disbursal_date.format("%d %B %Y"),
            letter.validity_date.format("%d %B %Y"),
            letter.lender_name,
        )
    }
}

/// Prefix plus the last ten digits of `YYYYMMDDHHMMSS`.
///
/// Unique per second only; two sanctions issued within the same second collide.
pub fn reference_number(prefix: &str, now: DateTime<Utc>) -> String {
    let stamp = now.format("%Y%m%d%H%M%S").to_string();
    let suffix = &stamp[stamp.len().saturating_sub(10)..];
    format!("{prefix}{suffix}")
}

#[derive(Clone)]
pub struct SanctionBuilder {
    renderer: Arc<dyn DocumentRenderer>,
    settings: SanctionSettings,
}

impl SanctionBuilder {
    pub fn new(renderer: Arc<dyn DocumentRenderer>, settings: SanctionSettings) -> Self {
        Self { renderer, settings }
    }

    pub fn settings(&self) -> &SanctionSettings {
        &self.settings
    }

    pub fn letter_at(
        &self,
        customer: &Customer,
        terms: &LoanTerms,
        credit: &CreditInfo,
        now: DateTime<Utc>,
    ) -> SanctionLetter {
        let today = now.date_naive();
        SanctionLetter {
            reference_number: reference_number(&self.settings.reference_prefix, now),
            lender_name: self.settings.lender_name.clone(),
            sanction_date: today,
            validity_date: today + Duration::days(self.settings.validity_days),
            expected_disbursal_date: today + Duration::days(self.settings.disbursal_days),
            customer: CustomerSnapshot::from(customer),
            loan: terms.clone(),
            credit: credit.clone(),
            terms: TERMS_AND_CONDITIONS.iter().map(|t| t.to_string()).collect(),
            documents_required: REQUIRED_DOCUMENTS.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub async fn build(
        &self,
        customer: &Customer,
        terms: &LoanTerms,
        credit: &CreditInfo,
    ) -> Result<SanctionRecord> {
        self.build_at(customer, terms, credit, Utc::now()).await
    }

    pub async fn build_at(
        &self,
        customer: &Customer,
        terms: &LoanTerms,
        credit: &CreditInfo,
        now: DateTime<Utc>,
    ) -> Result<SanctionRecord> {
        let letter = self.letter_at(customer, terms, credit, now);
        info!(
            reference_number = %letter.reference_number,
            customer = %customer.name,
            amount = terms.loan_amount,
            "Generating sanction letter"
        );
        let document = self.renderer.render(&letter).await?;
        Ok(SanctionRecord {
            letter,
            document,
            sanctioned_at: now,
        })
    }
}
