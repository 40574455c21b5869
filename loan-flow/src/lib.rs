pub mod calculator;
pub mod config;
pub mod credit;
pub mod customer;
pub mod error;
pub mod flow;
pub mod format;
pub mod phrase;
pub mod render;
pub mod runner;
pub mod sanction;
pub mod session;
pub mod stages;
pub mod storage;
pub mod task;
pub mod underwriting;

// Re-export commonly used types
pub use calculator::{LoanTerms, TenureOption, TenureSuggestions};
pub use config::{AmountLimits, LoanFlowConfig};
pub use credit::{CreditBureau, CreditInfo, FixedBureau, ScoreBand, SimulatedBureau};
pub use customer::{Customer, CustomerDirectory, InMemoryCustomerDirectory, verify_address, verify_pan};
pub use error::{FlowError, Result};
pub use flow::{LoanFlow, LoanFlowBuilder, TurnResult};
pub use phrase::{KeywordInterpreter, PhraseInterpreter, YesNo};
pub use render::{ArtifactLocator, DocumentRenderer, InMemoryRenderer, TextLetterRenderer};
pub use runner::FlowRunner;
pub use sanction::{SanctionBuilder, SanctionLetter, SanctionRecord, SanctionSettings};
pub use session::{DocumentRef, Session, Stage};
pub use stages::{FlowDependencies, standard_flow};
pub use storage::{InMemorySessionStorage, SessionStorage};
pub use task::{ActionTag, Inbound, NextAction, Payload, StageTask, TaskResult};
pub use underwriting::{DecisionReason, Outcome, Underwriter, UnderwritingPolicy, UnderwritingResult};
