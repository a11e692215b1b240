//! Hyperparameter search for a CIFAR-10 convolutional classifier.
//!
//! This crate wires the ML crates into one experiment:
//!
//! # Pipeline
//!
//! 1. [`load_data`] - Load CIFAR-10 (or synthetic images) and validate them
//! 2. [`ChoiceSets::search_space`] - Declare the five tunable choices
//! 3. [`train_trial`] - Train one [`ml_models::ConvNet`], score it by
//!    negated best validation accuracy
//! 4. [`run`] - Drive [`ml_search::minimize`], evaluate the winner on the
//!    test set and write `trials.json`, `best_run.json` and the checkpoint
//! 5. [`load_best_model`] - Rebuild the winner from an output directory
//!    (`best_run.json` records the network, the checkpoint its weights)
//!
//! # Configuration
//!
//! [`TuneConfig`] is plain serde data; the `cifar-tune` binary reads it
//! from JSON and applies command-line overrides.
//!
//! # Example
//!
//! ```no_run
//! use cifar_tune::{TuneConfig, run};
//!
//! let config = TuneConfig::default().with_output_dir("runs/cifar");
//! let report = run(&config)?;
//! println!("best: {}", report.best.assignment);
//! # Ok::<(), cifar_tune::TuneError>(())
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

mod config;
mod error;
mod experiment;

// Re-export configuration
pub use config::{ChoiceSets, DataSource, HyperParams, TuneConfig, names};

// Re-export the experiment
pub use experiment::{
    BEST_RUN_FILE, BestRun, CHECKPOINT_STEM, Device, EvalBackend, TRIALS_FILE, TrainBackend,
    TuneReport, load_best_model, load_data, model_config, run, train_trial,
};

// Re-export error types
pub use error::{Result, TuneError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        BestRun, ChoiceSets, DataSource, HyperParams, TuneConfig, TuneError, TuneReport,
        load_best_model, run,
    };
}
