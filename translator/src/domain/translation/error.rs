//! Translation error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    #[error("Invalid \"{action}\" rule: {reason}")]
    InvalidRule { action: &'static str, reason: String },

    #[error("\"{action}\" rule expects {expected} values, metric \"{metric}\" has another kind")]
    TypeMismatch {
        action: &'static str,
        metric: String,
        expected: &'static str,
    },

    #[error("Delta translation TTL must be at least one second")]
    InvalidTtl,

    #[error("Failed to parse translation rules: {0}")]
    ParseError(String),
}

impl TranslationError {
    pub(crate) fn invalid(action: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            action,
            reason: reason.into(),
        }
    }
}
