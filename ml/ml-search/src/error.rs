//! Error types for ml-search crate.

use thiserror::Error;

/// Errors that can occur while defining or running a search.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The search space declares no parameters.
    #[error("search space is empty")]
    EmptySpace,

    /// A choice parameter has no options.
    #[error("choice parameter '{0}' has no options")]
    EmptyChoice(String),

    /// A range parameter has invalid bounds.
    #[error("invalid domain for '{name}': {reason}")]
    InvalidDomain {
        /// Parameter name.
        name: String,
        /// Description of the problem.
        reason: String,
    },

    /// An assignment lacks a declared parameter.
    #[error("parameter not found: {0}")]
    ParameterNotFound(String),

    /// A value lies outside its domain or has the wrong type.
    #[error("invalid value for '{name}': {value}")]
    InvalidValue {
        /// Parameter name.
        name: String,
        /// The offending value, rendered.
        value: String,
    },

    /// The search finished without any successful trial.
    #[error("no completed trials ({0} recorded)")]
    NoCompletedTrials(usize),

    /// Invalid search configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error while persisting trials.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Trial history (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SearchError {
    /// Creates an invalid domain error.
    #[must_use]
    pub fn invalid_domain(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDomain {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(name: impl Into<String>, value: impl std::fmt::Display) -> Self {
        Self::InvalidValue {
            name: name.into(),
            value: value.to_string(),
        }
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}

/// Result type for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
