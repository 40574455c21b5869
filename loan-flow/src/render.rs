use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Write},
    path::PathBuf,
    sync::Arc,
};
use tracing::info;

use crate::{
    error::{FlowError, Result},
    format::{inr, inr_decimal},
    sanction::SanctionLetter,
};

/// Opaque locator returned by a renderer (file path, URL, object key, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactLocator(pub String);

impl ArtifactLocator {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns a sanction letter into a downloadable artifact
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, letter: &SanctionLetter) -> Result<ArtifactLocator>;
}

pub fn letter_file_name(letter: &SanctionLetter) -> String {
    format!("sanction_letter_{}.txt", letter.reference_number)
}

/// Plain-text layout of the sanction letter
pub fn render_text(letter: &SanctionLetter) -> String {
    let mut out = String::new();
    // `fmt::Write` for String never returns an error
    let _ = write_letter(&mut out, letter);
    out
}

fn write_letter(out: &mut impl Write, letter: &SanctionLetter) -> fmt::Result {
    let date = |d: &chrono::NaiveDate| d.format("%d %B %Y").to_string();
    let loan = &letter.loan;

    writeln!(out, "{}", letter.lender_name.to_uppercase())?;
    writeln!(out, "Personal Loan Sanction Letter\n")?;
    writeln!(out, "Loan Reference Number: {}", letter.reference_number)?;
    writeln!(out, "Date of Sanction:      {}", date(&letter.sanction_date))?;
    writeln!(out, "Valid Until:           {}\n", date(&letter.validity_date))?;

    writeln!(out, "Customer Details")?;
    writeln!(out, "  Name:    {}", letter.customer.name)?;
    writeln!(out, "  Address: {}", letter.customer.address)?;
    writeln!(out, "  PAN:     {}", letter.customer.pan)?;
    writeln!(out, "  Email:   {}\n", letter.customer.email)?;

    writeln!(out, "Loan Details")?;
    writeln!(out, "  Sanctioned Amount:    {}", inr(loan.loan_amount))?;
    writeln!(out, "  Tenure:               {} months", loan.tenure_months)?;
    writeln!(out, "  Interest Rate:        {}% p.a.", loan.interest_rate)?;
    writeln!(out, "  EMI Amount:           {}", inr_decimal(loan.emi))?;
    writeln!(out, "  Processing Fee:       {}", inr_decimal(loan.processing_fee))?;
    writeln!(out, "  Total Interest:       {}", inr_decimal(loan.total_interest))?;
    writeln!(out, "  Total Amount Payable: {}\n", inr_decimal(loan.total_payable))?;

    writeln!(
        out,
        "Credit Score: {} ({}, {})\n",
        letter.credit.credit_score, letter.credit.score_band, letter.credit.bureau
    )?;

    writeln!(out, "Terms and Conditions")?;
    for (idx, term) in letter.terms.iter().enumerate() {
        writeln!(out, "  {}. {}", idx + 1, term)?;
    }
    writeln!(out)?;

    writeln!(out, "Documents Required for Disbursal")?;
    for document in &letter.documents_required {
        writeln!(out, "  - {}", document)?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "This is a system-generated document and does not require a signature."
    )
}

/// Writes letters as text files into a directory
pub struct TextLetterRenderer {
    output_dir: PathBuf,
}

impl TextLetterRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl DocumentRenderer for TextLetterRenderer {
    async fn render(&self, letter: &SanctionLetter) -> Result<ArtifactLocator> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| FlowError::Rendering(format!("cannot create {:?}: {}", self.output_dir, e)))?;

        let path = self.output_dir.join(letter_file_name(letter));
        tokio::fs::write(&path, render_text(letter))
            .await
            .map_err(|e| FlowError::Rendering(format!("cannot write {:?}: {}", path, e)))?;

        info!(path = %path.display(), "Sanction letter written");
        Ok(ArtifactLocator(path.display().to_string()))
    }
}

/// Keeps rendered letters in memory, keyed by reference number
#[derive(Clone, Default)]
pub struct InMemoryRenderer {
    letters: Arc<DashMap<String, String>>,
}

impl InMemoryRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reference_number: &str) -> Option<String> {
        self.letters.get(reference_number).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.letters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }
}

#[async_trait]
impl DocumentRenderer for InMemoryRenderer {
    async fn render(&self, letter: &SanctionLetter) -> Result<ArtifactLocator> {
        self.letters
            .insert(letter.reference_number.clone(), render_text(letter));
        Ok(ArtifactLocator(format!("memory://{}", letter_file_name(letter))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        calculator::loan_terms,
        credit::CreditInfo,
        customer::demo_customers,
        sanction::{SanctionBuilder, SanctionSettings},
    };
    use chrono::{TimeZone, Utc};

    fn letter() -> SanctionLetter {
        let builder = SanctionBuilder::new(Arc::new(InMemoryRenderer::new()), SanctionSettings::default());
        builder.letter_at(
            &demo_customers().remove(1),
            &loan_terms(250_000, 36),
            &CreditInfo::from_raw_score(750, "CIBIL"),
            Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap(),
        )
    }

    #[test]
    fn text_layout_lists_terms_and_documents() {
        let text = render_text(&letter());
        assert!(text.starts_with("SUMMIT CAPITAL"));
        assert!(text.contains("Loan Reference Number: SCPL0105100000"));
        assert!(text.contains("  1. This sanction is valid for 30 days"));
        assert!(text.contains("  8. The company reserves the right"));
        assert!(text.contains("  - PAN Card (verified copy)"));
        assert!(text.contains("Sanctioned Amount:    ₹250,000"));
    }

    /// Accepts a fixed number of bytes, then fails
    struct ShortWriter(usize);

    impl Write for ShortWriter {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            self.0 = self.0.checked_sub(s.len()).ok_or(fmt::Error)?;
            Ok(())
        }
    }

    #[test]
    fn layout_stops_at_first_write_error() {
        assert!(write_letter(&mut ShortWriter(64), &letter()).is_err());

        let full = render_text(&letter());
        assert!(write_letter(&mut ShortWriter(full.len()), &letter()).is_ok());
        assert!(full.ends_with("does not require a signature.\n"));
    }

    #[tokio::test]
    async fn text_renderer_writes_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = TextLetterRenderer::new(dir.path().join("letters"));
        let letter = letter();

        let locator = renderer.render(&letter).await.unwrap();

        let expected = dir.path().join("letters").join("sanction_letter_SCPL0105100000.txt");
        assert_eq!(locator.as_str(), expected.display().to_string());
        let written = tokio::fs::read_to_string(&expected).await.unwrap();
        assert_eq!(written, render_text(&letter));
    }
}
