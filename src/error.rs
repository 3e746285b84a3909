//! Error types
//!
//! Rule validation reports a `RuleError` carrying a reason code and the
//! offending path. Everything the engine itself can fail on is an `EngineError`.

use thiserror::Error;

use crate::types::{RuleId, RuleReason};

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// A rejected rule definition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}: {detail}")]
pub struct RuleError {
    pub reason: RuleReason,
    pub detail: String,
}

impl RuleError {
    pub fn new(reason: RuleReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

/// Engine-level failures
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid rule: {0}")]
    InvalidRule(#[from] RuleError),

    #[error("Rule {0} not found")]
    RuleNotFound(RuleId),

    #[error("Round identifier must not be empty")]
    EmptyRoundId,

    #[error("Storage error at '{path}': {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl EngineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        EngineError::Configuration {
            message: message.into(),
        }
    }

    pub fn storage(path: impl Into<String>, source: std::io::Error) -> Self {
        EngineError::Storage {
            path: path.into(),
            source,
        }
    }
}
