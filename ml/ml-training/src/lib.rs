//! Training lifecycle for image classifiers.
//!
//! This crate fits any [`ml_models::ImageClassifier`] built on a Burn
//! autodiff backend:
//!
//! # Training Components
//!
//! - [`TrainingConfig`] - Epochs, batch size, optimizer and validation split
//! - [`Trainer`] - Mini-batch training loop with per-epoch validation
//! - [`evaluate`] - Loss and accuracy of a model over a partition
//! - [`TrainingMetrics`] - Metrics collected during training
//!
//! # Loss Functions
//!
//! - [`categorical_cross_entropy`] - Softmax cross-entropy against one-hot targets
//! - [`accuracy`] - Fraction of correct argmax predictions
//!
//! # Example
//!
//! ```ignore
//! use ml_training::{Trainer, TrainingConfig};
//!
//! let config = TrainingConfig::new(10).with_batch_size(32).with_seed(42);
//! let fitted = Trainer::new(config).fit(model, &dataset.train, &device)?;
//! println!("{}", fitted.metrics.summary());
//! ```
//!
//! # Quality Standards
//!
//! - Zero clippy/doc warnings
//! - Zero `unwrap`/`expect` in library code

// Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod batcher;
mod config;
mod error;
mod loss;
mod metrics;
mod trainer;

// Re-export configuration
pub use config::{OptimizerConfig, OptimizerType, TrainingConfig};

// Re-export batching
pub use batcher::ImageBatch;

// Re-export loss functions
pub use loss::{accuracy, categorical_cross_entropy, correct_predictions};

// Re-export metrics
pub use metrics::{EpochMetrics, TrainingMetrics};

// Re-export trainer
pub use trainer::{Evaluation, Fitted, Trainer, TrainingState, evaluate};

// Re-export error types
pub use error::{Result, TrainingError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        EpochMetrics, Evaluation, Fitted, ImageBatch, OptimizerConfig, OptimizerType, Trainer,
        TrainingConfig, TrainingError, TrainingMetrics, TrainingState, accuracy,
        categorical_cross_entropy, evaluate,
    };
}
