//! Eligibility rule engine.
//!
//! Rules run in a fixed order and the first one that decides wins:
//!
//! 1. credit score below the minimum rejects outright
//! 2. amounts within the pre-approved limit are approved
//! 3. amounts up to `salary_verification_multiplier` times the limit need a
//!    salary slip, then an EMI-to-salary check
//! 4. anything larger is rejected with the maximum eligible amount
//!
//! Every result carries the credit snapshot fetched in step one.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::info;

use crate::{
    calculator::{self, round2},
    credit::{CreditBureau, CreditInfo},
    customer::Customer,
    error::Result,
    format::inr,
    session::DocumentRef,
};

static SALARY_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{5,}").expect("salary token pattern is valid"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnderwritingPolicy {
    pub min_credit_score: u16,
    pub max_emi_ratio_percent: f64,
    pub salary_verification_multiplier: u64,
}

impl Default for UnderwritingPolicy {
    fn default() -> Self {
        Self {
            min_credit_score: 700,
            max_emi_ratio_percent: 50.0,
            salary_verification_multiplier: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    WithinPreApproved,
    SalaryVerified,
    SalarySlipRequired,
    CreditScoreLow,
    HighEmiRatio,
    ExceedsLimit,
}

/// Figures backing a rejection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RejectionDetail {
    CreditScore {
        credit_score: u16,
        minimum_score: u16,
    },
    EmiRatio {
        emi_amount: f64,
        emi_to_salary_ratio: f64,
        verified_salary: u64,
        max_affordable_emi: f64,
    },
    Limit {
        max_eligible_amount: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Approved {
        reason: DecisionReason,
        emi_amount: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        verified_salary: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        emi_to_salary_ratio: Option<f64>,
    },
    NeedsDocument {
        reason: DecisionReason,
    },
    Rejected {
        reason: DecisionReason,
        detail: RejectionDetail,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingResult {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub credit_info: CreditInfo,
    pub message: String,
}

impl UnderwritingResult {
    pub fn reason(&self) -> DecisionReason {
        match &self.outcome {
            Outcome::Approved { reason, .. }
            | Outcome::NeedsDocument { reason }
            | Outcome::Rejected { reason, .. } => *reason,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self.outcome, Outcome::Approved { .. })
    }
}

/// Everything the engine needs to decide one application
#[derive(Debug, Clone, Copy)]
pub struct Application<'a> {
    pub customer: &'a Customer,
    pub amount: u64,
    pub tenure_months: u32,
    pub interest_rate: f64,
    pub document: Option<&'a DocumentRef>,
}

/// First run of five or more digits in the document reference.
pub fn extract_salary(document: &DocumentRef) -> Option<u64> {
    SALARY_TOKEN
        .find(document.as_str())
        .and_then(|token| token.as_str().parse().ok())
}

#[derive(Clone)]
pub struct Underwriter {
    bureau: Arc<dyn CreditBureau>,
    policy: UnderwritingPolicy,
}

impl Underwriter {
    pub fn new(bureau: Arc<dyn CreditBureau>, policy: UnderwritingPolicy) -> Self {
        Self { bureau, policy }
    }

    pub fn policy(&self) -> &UnderwritingPolicy {
        &self.policy
    }

    pub async fn evaluate(&self, application: Application<'_>) -> Result<UnderwritingResult> {
        let customer = application.customer;
        let amount = application.amount;
        let policy = &self.policy;

        let raw_score = self.bureau.fetch_score(customer).await?;
        let credit_info = CreditInfo::from_raw_score(raw_score, self.bureau.name());
        let score = credit_info.credit_score;
        info!(
            customer = %customer.name,
            credit_score = score,
            band = %credit_info.score_band,
            amount,
            tenure_months = application.tenure_months,
            "Evaluating eligibility"
        );

        if score < policy.min_credit_score {
            info!(credit_score = score, "Rejected: credit score below minimum");
            return Ok(UnderwritingResult {
                outcome: Outcome::Rejected {
                    reason: DecisionReason::CreditScoreLow,
                    detail: RejectionDetail::CreditScore {
                        credit_score: score,
                        minimum_score: policy.min_credit_score,
                    },
                },
                message: format!(
                    "Unfortunately, your credit score ({}) is below our minimum requirement of {}. \
                     Please improve your credit score and reapply after 3 months.",
                    score, policy.min_credit_score
                ),
                credit_info,
            });
        }

        let emi_amount = calculator::emi(amount, application.interest_rate, application.tenure_months);
        let limit = customer.pre_approved_limit;

        if amount <= limit {
            info!(emi_amount, "Approved: within pre-approved limit");
            return Ok(UnderwritingResult {
                outcome: Outcome::Approved {
                    reason: DecisionReason::WithinPreApproved,
                    emi_amount,
                    verified_salary: None,
                    emi_to_salary_ratio: None,
                },
                message: format!(
                    "Great news! Your loan is instantly approved as it's within your pre-approved limit of {}.",
                    inr(limit)
                ),
                credit_info,
            });
        }

        let verification_ceiling = limit.saturating_mul(policy.salary_verification_multiplier);
        if amount > verification_ceiling {
            info!(max_eligible_amount = verification_ceiling, "Rejected: exceeds limit");
            return Ok(UnderwritingResult {
                outcome: Outcome::Rejected {
                    reason: DecisionReason::ExceedsLimit,
                    detail: RejectionDetail::Limit {
                        max_eligible_amount: verification_ceiling,
                    },
                },
                message: format!(
                    "The requested amount of {} exceeds twice your pre-approved limit. \
                     Based on your profile, we can offer up to {}.",
                    inr(amount),
                    inr(verification_ceiling)
                ),
                credit_info,
            });
        }

        let Some(document) = application.document else {
            info!("Salary slip required before deciding");
            return Ok(UnderwritingResult {
                outcome: Outcome::NeedsDocument {
                    reason: DecisionReason::SalarySlipRequired,
                },
                message: format!(
                    "Since you're requesting {}, which is above your pre-approved limit of {}, \
                     we need your latest salary slip to verify your repayment capacity.",
                    inr(amount),
                    inr(limit)
                ),
                credit_info,
            });
        };

        let salary = match extract_salary(document) {
            Some(extracted) => {
                info!(extracted, document = %document, "Using salary from document");
                extracted
            }
            None => {
                info!(stored = customer.monthly_salary, "Using stored salary");
                customer.monthly_salary
            }
        };
        let ratio = if salary == 0 {
            f64::INFINITY
        } else {
            emi_amount / salary as f64 * 100.0
        };
        info!(emi_amount, salary, ratio, "EMI to salary ratio");

        if ratio <= policy.max_emi_ratio_percent {
            return Ok(UnderwritingResult {
                outcome: Outcome::Approved {
                    reason: DecisionReason::SalaryVerified,
                    emi_amount,
                    verified_salary: Some(salary),
                    emi_to_salary_ratio: Some(round2(ratio)),
                },
                message: format!(
                    "Excellent! Your EMI ({}) is {:.1}% of your monthly salary, which is within our comfortable limit of {}%.",
                    inr(emi_amount.round() as u64),
                    ratio,
                    policy.max_emi_ratio_percent
                ),
                credit_info,
            });
        }

        let max_affordable_emi = round2(salary as f64 * policy.max_emi_ratio_percent / 100.0);
        Ok(UnderwritingResult {
            outcome: Outcome::Rejected {
                reason: DecisionReason::HighEmiRatio,
                detail: RejectionDetail::EmiRatio {
                    emi_amount,
                    emi_to_salary_ratio: round2(ratio),
                    verified_salary: salary,
                    max_affordable_emi,
                },
            },
            message: format!(
                "Unfortunately, the EMI ({}) would be {:.1}% of your monthly salary ({}), \
                 which exceeds our maximum limit of {}%. You can apply for a lower amount or longer tenure.",
                inr(emi_amount.round() as u64),
                ratio,
                inr(salary),
                policy.max_emi_ratio_percent
            ),
            credit_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        calculator::{SUPPORTED_TENURES, rate_for_tenure},
        credit::FixedBureau,
    };
    use approx::assert_abs_diff_eq;

    fn customer(limit: u64, salary: u64, score: u16) -> Customer {
        Customer {
            phone: "9000000000".to_string(),
            name: "Test Customer".to_string(),
            address: "1 Test Street".to_string(),
            pan: "AAAPA0000A".to_string(),
            email: "test@example.com".to_string(),
            city: "Pune".to_string(),
            monthly_salary: salary,
            pre_approved_limit: limit,
            credit_score: score,
        }
    }

    fn underwriter() -> Underwriter {
        Underwriter::new(Arc::new(FixedBureau::default()), UnderwritingPolicy::default())
    }

    async fn decide(customer: &Customer, amount: u64, document: Option<&DocumentRef>) -> UnderwritingResult {
        underwriter()
            .evaluate(Application {
                customer,
                amount,
                tenure_months: 36,
                interest_rate: 11.49,
                document,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn low_score_always_rejects() {
        let customer = customer(300_000, 60_000, 699);
        let slip = DocumentRef::new("slip_90000.pdf");
        for amount in [50_000, 300_000, 450_000, 2_000_000] {
            for tenure_months in SUPPORTED_TENURES {
                for document in [None, Some(&slip)] {
                    let result = underwriter()
                        .evaluate(Application {
                            customer: &customer,
                            amount,
                            tenure_months,
                            interest_rate: rate_for_tenure(tenure_months),
                            document,
                        })
                        .await
                        .unwrap();
                    assert_eq!(result.reason(), DecisionReason::CreditScoreLow);
                    assert!(matches!(result.outcome, Outcome::Rejected { .. }));
                    assert_eq!(result.credit_info.credit_score, 699);
                }
            }
        }
    }

    #[tokio::test]
    async fn amount_at_limit_is_pre_approved() {
        let customer = customer(300_000, 60_000, 750);
        let result = decide(&customer, 300_000, None).await;
        assert_eq!(result.reason(), DecisionReason::WithinPreApproved);
        assert!(result.is_approved());
    }

    #[tokio::test]
    async fn one_over_limit_needs_document() {
        let customer = customer(300_000, 60_000, 750);
        let result = decide(&customer, 300_001, None).await;
        assert_eq!(result.outcome, Outcome::NeedsDocument {
            reason: DecisionReason::SalarySlipRequired
        });
        assert_eq!(result.credit_info.credit_score, 750);
    }

    #[tokio::test]
    async fn twice_limit_is_in_verification_band() {
        let customer = customer(300_000, 60_000, 750);
        let result = decide(&customer, 600_000, None).await;
        assert_eq!(result.reason(), DecisionReason::SalarySlipRequired);

        let result = decide(&customer, 600_001, None).await;
        assert_eq!(result.reason(), DecisionReason::ExceedsLimit);
        assert_eq!(
            result.outcome,
            Outcome::Rejected {
                reason: DecisionReason::ExceedsLimit,
                detail: RejectionDetail::Limit { max_eligible_amount: 600_000 },
            }
        );
    }

    #[tokio::test]
    async fn document_salary_overrides_stored_salary() {
        let customer = customer(300_000, 60_000, 750);
        let slip = DocumentRef::new("uploads/s1_salary_slip_40000.pdf");
        let result = decide(&customer, 500_000, Some(&slip)).await;
        match result.outcome {
            Outcome::Approved {
                reason,
                verified_salary,
                emi_to_salary_ratio,
                emi_amount,
            } => {
                assert_eq!(reason, DecisionReason::SalaryVerified);
                assert_eq!(verified_salary, Some(40_000));
                assert_abs_diff_eq!(emi_amount, 16485.63, epsilon = 1e-9);
                assert_abs_diff_eq!(emi_to_salary_ratio.unwrap(), 41.21, epsilon = 1e-9);
            }
            other => panic!("expected approval, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn falls_back_to_stored_salary() {
        let customer = customer(300_000, 60_000, 750);
        let slip = DocumentRef::new("payslip.pdf");
        let result = decide(&customer, 500_000, Some(&slip)).await;
        match result.outcome {
            Outcome::Approved { verified_salary, .. } => assert_eq!(verified_salary, Some(60_000)),
            other => panic!("expected approval, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn high_ratio_rejects_with_affordable_emi() {
        let customer = customer(300_000, 60_000, 750);
        let slip = DocumentRef::new("slip_25000.pdf");
        let result = decide(&customer, 500_000, Some(&slip)).await;
        assert_eq!(result.reason(), DecisionReason::HighEmiRatio);
        match result.outcome {
            Outcome::Rejected {
                detail: RejectionDetail::EmiRatio { max_affordable_emi, verified_salary, .. },
                ..
            } => {
                assert_eq!(verified_salary, 25_000);
                assert_abs_diff_eq!(max_affordable_emi, 12_500.0);
            }
            other => panic!("expected high ratio rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn perturbed_score_is_clamped_before_rules() {
        let customer = customer(300_000, 60_000, 898);
        let underwriter =
            Underwriter::new(Arc::new(FixedBureau::new(5)), UnderwritingPolicy::default());
        let result = underwriter
            .evaluate(Application {
                customer: &customer,
                amount: 100_000,
                tenure_months: 12,
                interest_rate: 10.5,
                document: None,
            })
            .await
            .unwrap();
        assert_eq!(result.credit_info.credit_score, 900);
        assert!(result.is_approved());
    }

    #[test]
    fn salary_extraction_needs_five_digits() {
        assert_eq!(extract_salary(&DocumentRef::new("slip_85000.pdf")), Some(85_000));
        assert_eq!(extract_salary(&DocumentRef::new("slip_2024.pdf")), None);
        assert_eq!(extract_salary(&DocumentRef::new("slip.pdf")), None);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let result = UnderwritingResult {
            outcome: Outcome::NeedsDocument {
                reason: DecisionReason::SalarySlipRequired,
            },
            credit_info: CreditInfo::from_raw_score(750, "CIBIL"),
            message: "upload".to_string(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "needs_document");
        assert_eq!(json["reason"], "salary_slip_required");
        assert_eq!(json["credit_info"]["score_band"], "Very Good");
    }
}
