use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Mutex, time::Duration};
use tracing::debug;

use crate::{customer::Customer, error::Result};

pub const MIN_SCORE: u16 = 300;
pub const MAX_SCORE: u16 = 900;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreBand {
    Excellent,
    #[serde(rename = "Very Good")]
    VeryGood,
    Good,
    Fair,
    Poor,
}

impl ScoreBand {
    pub fn for_score(score: u16) -> Self {
        match score {
            s if s >= 800 => ScoreBand::Excellent,
            s if s >= 750 => ScoreBand::VeryGood,
            s if s >= 700 => ScoreBand::Good,
            s if s >= 650 => ScoreBand::Fair,
            _ => ScoreBand::Poor,
        }
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScoreBand::Excellent => "Excellent",
            ScoreBand::VeryGood => "Very Good",
            ScoreBand::Good => "Good",
            ScoreBand::Fair => "Fair",
            ScoreBand::Poor => "Poor",
        };
        f.write_str(label)
    }
}

/// Credit snapshot taken at the start of underwriting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditInfo {
    pub credit_score: u16,
    pub score_band: ScoreBand,
    pub bureau: String,
    pub fetched_at: DateTime<Utc>,
}

impl CreditInfo {
    /// Clamp a raw bureau score into range and band it.
    pub fn from_raw_score(raw: i32, bureau: impl Into<String>) -> Self {
        let credit_score = raw.clamp(MIN_SCORE as i32, MAX_SCORE as i32) as u16;
        Self {
            credit_score,
            score_band: ScoreBand::for_score(credit_score),
            bureau: bureau.into(),
            fetched_at: Utc::now(),
        }
    }
}

/// Source of credit scores
#[async_trait]
pub trait CreditBureau: Send + Sync {
    /// Bureau label recorded on the credit snapshot
    fn name(&self) -> &str;

    /// Raw, unclamped score for the customer
    async fn fetch_score(&self, customer: &Customer) -> Result<i32>;
}

/// Stand-in bureau: the stored score nudged by a bounded random amount.
pub struct SimulatedBureau {
    name: String,
    max_perturbation: i32,
    latency: Duration,
    rng: Mutex<StdRng>,
}

impl SimulatedBureau {
    pub fn new(name: impl Into<String>, max_perturbation: i32, latency: Duration) -> Self {
        Self {
            name: name.into(),
            max_perturbation: max_perturbation.abs(),
            latency,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn perturbation(&self) -> i32 {
        if self.max_perturbation == 0 {
            return 0;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.random_range(-self.max_perturbation..=self.max_perturbation)
    }
}

impl Default for SimulatedBureau {
    fn default() -> Self {
        Self::new("CIBIL", 5, Duration::ZERO)
    }
}

#[async_trait]
impl CreditBureau for SimulatedBureau {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_score(&self, customer: &Customer) -> Result<i32> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let variation = self.perturbation();
        debug!(
            customer = %customer.name,
            base_score = customer.credit_score,
            variation,
            "Simulated bureau score"
        );
        Ok(customer.credit_score as i32 + variation)
    }
}

/// Deterministic bureau returning the stored score plus a fixed offset.
pub struct FixedBureau {
    offset: i32,
}

impl FixedBureau {
    pub fn new(offset: i32) -> Self {
        Self { offset }
    }
}

impl Default for FixedBureau {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl CreditBureau for FixedBureau {
    fn name(&self) -> &str {
        "CIBIL"
    }

    async fn fetch_score(&self, customer: &Customer) -> Result<i32> {
        Ok(customer.credit_score as i32 + self.offset)
    }
}
