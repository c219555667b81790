//! Error types for rlwf

use thiserror::Error;

/// Main error type for workflow loading and validation
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed workflow document: {0}")]
    Parse(String),

    #[error("Missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Invalid value for `{field}`: {message}")]
    InvalidField { field: String, message: String },

    #[error("Configuration source error: {0}")]
    Source(#[from] config::ConfigError),
}

impl WorkflowError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The dotted path of the offending field, when the error is tied to one
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField(field) => Some(field),
            Self::InvalidField { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for WorkflowError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;
