//! Rate, EMI and fee arithmetic.
//!
//! Everything here is a pure function of its inputs. Amounts are rupees;
//! derived currency figures are rounded to two decimals (half away from zero).

use serde::{Deserialize, Serialize};

/// Tenures offered to customers, in months
pub const SUPPORTED_TENURES: [u32; 5] = [12, 24, 36, 48, 60];

/// Annual rate applied to any tenure missing from the table
pub const DEFAULT_RATE: f64 = 11.49;

pub const PROCESSING_FEE_PERCENT: f64 = 2.0;

/// EMI as a share of salary at or below which a tenure counts as comfortable
pub const COMFORTABLE_EMI_RATIO: f64 = 35.0;

const RATE_TABLE: [(u32, f64); 5] = [
    (12, 10.5),
    (24, 10.99),
    (36, 11.49),
    (48, 11.99),
    (60, 12.49),
];

/// Computed loan offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub loan_amount: u64,
    pub tenure_months: u32,
    pub tenure_years: u32,
    pub interest_rate: f64,
    pub emi: f64,
    pub processing_fee: f64,
    pub total_interest: f64,
    pub total_payable: f64,
}

/// One row of the tenure comparison shown after the amount is chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenureOption {
    pub tenure_months: u32,
    pub interest_rate: f64,
    pub emi: f64,
    pub emi_ratio: f64,
    pub comfortable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenureSuggestions {
    pub all_options: Vec<TenureOption>,
    pub recommended: TenureOption,
    /// False when no tenure was comfortable and the longest one was picked
    pub recommended_is_comfortable: bool,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn rate_for_tenure(months: u32) -> f64 {
    RATE_TABLE
        .iter()
        .find(|(tenure, _)| *tenure == months)
        .map(|(_, rate)| *rate)
        .unwrap_or(DEFAULT_RATE)
}

/// Reducing-balance EMI: P * r * (1+r)^n / ((1+r)^n - 1) with r = annual / 1200.
pub fn emi(principal: u64, annual_rate_percent: f64, months: u32) -> f64 {
    if months == 0 {
        return 0.0;
    }
    let principal = principal as f64;
    let monthly_rate = annual_rate_percent / 1200.0;
    if monthly_rate <= 0.0 {
        return round2(principal / months as f64);
    }
    let growth = (1.0 + monthly_rate).powi(months as i32);
    round2(principal * monthly_rate * growth / (growth - 1.0))
}

pub fn processing_fee(amount: u64) -> f64 {
    round2(amount as f64 * PROCESSING_FEE_PERCENT / 100.0)
}

pub fn loan_terms(amount: u64, tenure_months: u32) -> LoanTerms {
    let interest_rate = rate_for_tenure(tenure_months);
    let emi = emi(amount, interest_rate, tenure_months);
    let total_payable = round2(emi * tenure_months as f64);
    LoanTerms {
        loan_amount: amount,
        tenure_months,
        tenure_years: tenure_months / 12,
        interest_rate,
        emi,
        processing_fee: processing_fee(amount),
        total_interest: round2(total_payable - amount as f64),
        total_payable,
    }
}

/// Compare every supported tenure against the customer's salary and pick the
/// shortest comfortable one, or the longest when none is comfortable.
pub fn suggest_tenures(monthly_salary: u64, amount: u64) -> TenureSuggestions {
    let all_options: Vec<TenureOption> = SUPPORTED_TENURES
        .iter()
        .map(|&tenure_months| {
            let interest_rate = rate_for_tenure(tenure_months);
            let emi = emi(amount, interest_rate, tenure_months);
            let ratio = if monthly_salary == 0 {
                f64::INFINITY
            } else {
                emi / monthly_salary as f64 * 100.0
            };
            TenureOption {
                tenure_months,
                interest_rate,
                emi,
                emi_ratio: round2(ratio),
                comfortable: ratio <= COMFORTABLE_EMI_RATIO,
            }
        })
        .collect();

    let shortest_comfortable = all_options
        .iter()
        .filter(|option| option.comfortable)
        .min_by_key(|option| option.tenure_months)
        .cloned();

    let recommended_is_comfortable = shortest_comfortable.is_some();
    let recommended = match shortest_comfortable {
        Some(option) => option,
        None => all_options
            .iter()
            .max_by_key(|option| option.tenure_months)
            .cloned()
            .unwrap_or_else(|| TenureOption {
                tenure_months: 0,
                interest_rate: DEFAULT_RATE,
                emi: 0.0,
                emi_ratio: 0.0,
                comfortable: false,
            }),
    };

    TenureSuggestions {
        all_options,
        recommended,
        recommended_is_comfortable,
    }
}
