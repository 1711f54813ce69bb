
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Malformed rule: {0}")]
    MalformedRule(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Required collection missing: {0}")]
    RequiredTableMissing(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RuleError {
    /// Failures that must reach the caller instead of degrading to an empty result.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RuleError::RequiredTableMissing(_) | RuleError::Config(_))
    }
}
