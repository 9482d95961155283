//! # Query Pipeline Error Types
//!
//! Every failure aborts the enclosing `execute()` call. Variants separate
//! configuration mistakes (fixable when plugins are set up) from failures that
//! depend on runtime data.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed middleware group, duplicate names, missing options, unknown adapter.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid stage list shape or ordering.
    #[error("Stage validation error: {0}")]
    StageValidation(String),

    /// Undeclared join requested, unresolvable order, or a join the adapter could not apply.
    #[error("Join resolution error: {0}")]
    JoinResolution(String),

    /// The adapter returned nothing where a value is mandatory.
    #[error("Adapter contract error: {0}")]
    AdapterContract(String),

    /// A user middleware or stage body rejected.
    #[error("Middleware error at stage \"{stage}\": {message}")]
    Middleware { stage: String, message: String },

    /// The adapter failed while executing an operation.
    #[error("Adapter error: {0}")]
    Adapter(#[from] anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),
}

impl QueryError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn stage_validation(message: impl Into<String>) -> Self {
        Self::StageValidation(message.into())
    }

    pub fn join_resolution(message: impl Into<String>) -> Self {
        Self::JoinResolution(message.into())
    }

    pub fn adapter_contract(message: impl Into<String>) -> Self {
        Self::AdapterContract(message.into())
    }

    pub fn middleware(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Middleware {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// True for mistakes that can be fixed at plugin setup time.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Settings(_))
    }

    /// The bare message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Configuration(msg)
            | Self::StageValidation(msg)
            | Self::JoinResolution(msg)
            | Self::AdapterContract(msg) => msg.clone(),
            Self::Middleware { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
