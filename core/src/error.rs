use thiserror::Error;

use crate::domain::BasicType;
use crate::hql::Diagnostic;
use crate::semantic::ComplianceViolation;

pub type HqlResult<T> = Result<T, HqlError>;

/// Coarse classification of a compile failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parsing,
    Syntax,
    Resolution,
    Semantic,
    Compliance,
    NumericFormat,
    NotYetImplemented,
    Config,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HqlError {
    /// The parse tree did not have the shape the builder expects.
    #[error("Parsing error: {0}")]
    Parsing(String),

    #[error("Syntax error: {}", .0.render())]
    Syntax(Diagnostic),

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Semantic error: {0}")]
    Semantic(String),

    #[error("Strict JPQL compliance violation [{violation}]: {message}")]
    Compliance {
        violation: ComplianceViolation,
        message: String,
    },

    #[error("Unable to convert literal [{text}] to {target}")]
    NumericFormat { text: String, target: BasicType },

    #[error("Not yet implemented: {0}")]
    NotYetImplemented(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HqlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HqlError::Parsing(_) => ErrorKind::Parsing,
            HqlError::Syntax(_) => ErrorKind::Syntax,
            HqlError::Resolution(_) => ErrorKind::Resolution,
            HqlError::Semantic(_) => ErrorKind::Semantic,
            HqlError::Compliance { .. } => ErrorKind::Compliance,
            HqlError::NumericFormat { .. } => ErrorKind::NumericFormat,
            HqlError::NotYetImplemented(_) => ErrorKind::NotYetImplemented,
            HqlError::Config(_) => ErrorKind::Config,
        }
    }

    /// The violated rule, when this is a compliance error.
    pub fn violation(&self) -> Option<ComplianceViolation> {
        match self {
            HqlError::Compliance { violation, .. } => Some(*violation),
            _ => None,
        }
    }

    pub(crate) fn numeric_format(text: impl Into<String>, target: BasicType) -> Self {
        HqlError::NumericFormat {
            text: text.into(),
            target,
        }
    }
}

impl From<serde_json::Error> for HqlError {
    fn from(err: serde_json::Error) -> Self {
        HqlError::Config(err.to_string())
    }
}
