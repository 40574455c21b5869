use thiserror::Error;

use crate::session::Stage;

/// Errors produced while running a loan conversation turn
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("No task registered for stage: {0}")]
    StageNotRegistered(Stage),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session is missing {field} at stage {stage}")]
    MissingSessionData { stage: Stage, field: &'static str },

    #[error("Credit bureau error: {0}")]
    CreditBureau(String),

    #[error("Document rendering failed: {0}")]
    Rendering(String),

    #[error("Customer directory error: {0}")]
    CustomerDirectory(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stage chain exceeded {0} hops in a single turn")]
    ChainLimitExceeded(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl FlowError {
    pub(crate) fn missing(stage: Stage, field: &'static str) -> Self {
        FlowError::MissingSessionData { stage, field }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
