//! Error types for backoff configuration.
//!
//! The backoff engine itself never fails: work faults are caught and logged,
//! and both budget exhaustion and cancellation are normal exits. Errors only
//! surface while turning configuration into a manager.

use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while loading or validating a [`BackoffConfig`](crate::config::BackoffConfig)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A field holds a value the policy cannot use
    #[error("Invalid backoff configuration: {field} {reason}")]
    InvalidConfig {
        /// Name of the offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// An environment variable could not be parsed
    #[error("Invalid value for environment variable {var}: '{value}'")]
    Env {
        /// Variable name
        var: &'static str,
        /// Raw value that failed to parse
        value: String,
    },
}

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::invalid("factor", "must be finite and non-negative, got -1");
        assert_eq!(
            err.to_string(),
            "Invalid backoff configuration: factor must be finite and non-negative, got -1"
        );

        let err = Error::Env {
            var: "LULL_BACKOFF_STEPS",
            value: "many".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for environment variable LULL_BACKOFF_STEPS: 'many'"
        );
    }
}
