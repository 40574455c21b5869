//! Flow configuration.
//!
//! Every section has defaults, so an empty YAML document is a valid config:
//!
//! ```yaml
//! limits:
//!   min_amount: 50000
//!   max_amount: 2000000
//! underwriting:
//!   min_credit_score: 700
//! bureau:
//!   name: CIBIL
//!   max_perturbation: 5
//!   simulated_latency_ms: 500
//! sanction:
//!   reference_prefix: SCPL
//!   lender_name: Summit Capital
//! documents:
//!   output_dir: generated_letters
//! ```

use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc, time::Duration};

use crate::{
    credit::{CreditBureau, SimulatedBureau},
    customer::{Customer, CustomerDirectory, InMemoryCustomerDirectory, demo_customers},
    error::{FlowError, Result},
    flow::LoanFlow,
    phrase::{KeywordInterpreter, PhraseInterpreter},
    render::{DocumentRenderer, TextLetterRenderer},
    sanction::{SanctionBuilder, SanctionSettings},
    stages::{self, FlowDependencies},
    underwriting::{Underwriter, UnderwritingPolicy},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmountLimits {
    pub min_amount: u64,
    pub max_amount: u64,
}

impl Default for AmountLimits {
    fn default() -> Self {
        Self {
            min_amount: 50_000,
            max_amount: 2_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BureauSettings {
    pub name: String,
    pub max_perturbation: i32,
    pub simulated_latency_ms: u64,
    /// Fixed seed for reproducible demo runs
    pub seed: Option<u64>,
}

impl Default for BureauSettings {
    fn default() -> Self {
        Self {
            name: "CIBIL".to_string(),
            max_perturbation: 5,
            simulated_latency_ms: 0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    pub output_dir: String,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            output_dir: "generated_letters".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanFlowConfig {
    pub limits: AmountLimits,
    pub underwriting: UnderwritingPolicy,
    pub bureau: BureauSettings,
    pub sanction: SanctionSettings,
    pub documents: DocumentSettings,
    pub customers: Vec<Customer>,
}

impl Default for LoanFlowConfig {
    fn default() -> Self {
        Self {
            limits: AmountLimits::default(),
            underwriting: UnderwritingPolicy::default(),
            bureau: BureauSettings::default(),
            sanction: SanctionSettings::default(),
            documents: DocumentSettings::default(),
            customers: demo_customers(),
        }
    }
}

impl LoanFlowConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let config: LoanFlowConfig = if source.trim().is_empty() {
            LoanFlowConfig::default()
        } else {
            serde_yaml::from_str(source)?
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| FlowError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.limits.min_amount == 0 || self.limits.min_amount > self.limits.max_amount {
            return Err(FlowError::Config(format!(
                "invalid amount limits: min {} max {}",
                self.limits.min_amount, self.limits.max_amount
            )));
        }
        if self.underwriting.salary_verification_multiplier == 0 {
            return Err(FlowError::Config(
                "salary_verification_multiplier must be at least 1".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.underwriting.max_emi_ratio_percent) {
            return Err(FlowError::Config(format!(
                "max_emi_ratio_percent out of range: {}",
                self.underwriting.max_emi_ratio_percent
            )));
        }
        Ok(())
    }

    pub fn bureau(&self) -> SimulatedBureau {
        let bureau = SimulatedBureau::new(
            self.bureau.name.clone(),
            self.bureau.max_perturbation,
            Duration::from_millis(self.bureau.simulated_latency_ms),
        );
        match self.bureau.seed {
            Some(seed) => bureau.with_seed(seed),
            None => bureau,
        }
    }

    pub fn directory(&self) -> InMemoryCustomerDirectory {
        InMemoryCustomerDirectory::with_customers(self.customers.clone())
    }

    /// Wire the given collaborators into the standard flow.
    pub fn dependencies(
        &self,
        directory: Arc<dyn CustomerDirectory>,
        interpreter: Arc<dyn PhraseInterpreter>,
        bureau: Arc<dyn CreditBureau>,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> FlowDependencies {
        FlowDependencies {
            directory,
            interpreter,
            underwriter: Underwriter::new(bureau, self.underwriting.clone()),
            sanction_builder: SanctionBuilder::new(renderer, self.sanction.clone()),
            limits: self.limits.clone(),
            lender_name: self.sanction.lender_name.clone(),
        }
    }

    /// Standard flow with the default collaborators.
    pub fn build_flow(&self) -> LoanFlow {
        let dependencies = self.dependencies(
            Arc::new(self.directory()),
            Arc::new(KeywordInterpreter::new()),
            Arc::new(self.bureau()),
            Arc::new(TextLetterRenderer::new(&self.documents.output_dir)),
        );
        stages::standard_flow(dependencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = LoanFlowConfig::from_yaml_str("").unwrap();
        assert_eq!(config, LoanFlowConfig::default());
        assert_eq!(config.customers.len(), 4);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = LoanFlowConfig::from_yaml_str(
            "limits:\n  max_amount: 1000000\nunderwriting:\n  min_credit_score: 720\n",
        )
        .unwrap();
        assert_eq!(config.limits.min_amount, 50_000);
        assert_eq!(config.limits.max_amount, 1_000_000);
        assert_eq!(config.underwriting.min_credit_score, 720);
        assert_eq!(config.underwriting.max_emi_ratio_percent, 50.0);
        assert_eq!(config.sanction.validity_days, 30);
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let err = LoanFlowConfig::from_yaml_str("limits:\n  min_amount: 500000\n  max_amount: 100000\n")
            .unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let err = LoanFlowConfig::from_yaml_str("limits: [1, 2").unwrap_err();
        assert!(matches!(err, FlowError::Yaml(_)));
    }

    #[test]
    fn standard_flow_covers_every_stage() {
        let flow = LoanFlowConfig::default().build_flow();
        assert!(flow.missing_stages().is_empty());
    }

    #[test]
    fn sample_config_parses() {
        let config = LoanFlowConfig::from_yaml_str(include_str!("../../config/loan-flow.yaml")).unwrap();
        assert_eq!(config.customers.len(), 2);
        assert_eq!(config.bureau.simulated_latency_ms, 500);
        assert_eq!(config.customers[1].pre_approved_limit, 800_000);
    }

    #[tokio::test]
    async fn load_reports_missing_file() {
        let err = LoanFlowConfig::load("/nonexistent/loan-flow.yaml").await.unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }
}
