//! Error types for cifar-tune crate.

use thiserror::Error;

/// Errors raised while running a tuning experiment.
#[derive(Debug, Error)]
pub enum TuneError {
    /// Invalid experiment configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Loading or validating data failed.
    #[error(transparent)]
    Dataset(#[from] ml_dataset::DatasetError),

    /// Building or persisting a model failed.
    #[error(transparent)]
    Model(#[from] ml_models::ModelError),

    /// Training or evaluation failed.
    #[error(transparent)]
    Training(#[from] ml_training::TrainingError),

    /// The search failed.
    #[error(transparent)]
    Search(#[from] ml_search::SearchError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TuneError {
    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}

/// Result type for tuning operations.
pub type Result<T> = std::result::Result<T, TuneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_crate_errors() {
        let err: TuneError = ml_search::SearchError::NoCompletedTrials(2).into();
        assert!(matches!(err, TuneError::Search(_)));
        assert!(err.to_string().contains("no completed trials"));

        let err: TuneError = ml_dataset::DatasetError::EmptyDataset.into();
        assert!(matches!(err, TuneError::Dataset(_)));
    }

    #[test]
    fn invalid_config_message() {
        let err = TuneError::invalid_config("max_evals must be > 0");
        assert!(err.to_string().contains("invalid configuration"));
    }
}
