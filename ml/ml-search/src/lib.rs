//! Hyperparameter search over declared spaces.
//!
//! This crate provides the search half of a tuning run:
//!
//! # Search Spaces
//!
//! - [`SearchSpace`] - Named [`ParameterDomain`]s (choice, uniform, log-uniform)
//! - [`Assignment`] - One value per parameter, with typed getters
//!
//! # Algorithms
//!
//! - [`Algorithm::Random`] - Independent draws from the priors
//! - [`Algorithm::Tpe`] - Tree-structured Parzen estimator ([`TpeConfig`])
//!
//! # Driver
//!
//! - [`minimize`] - Sequential search loop with resumable [`Trials`]
//! - [`TrialOutcome`] - What an objective returns, optionally with an artifact
//!
//! # Example
//!
//! ```
//! use ml_search::{ParameterDomain, SearchConfig, SearchError, SearchSpace, TrialOutcome, Trials, minimize};
//!
//! let space = SearchSpace::new()
//!     .with("dense_units", ParameterDomain::choice([128, 256, 512]))
//!     .unwrap();
//!
//! let mut trials = Trials::new();
//! let outcome = minimize(
//!     &space,
//!     |a| Ok::<_, SearchError>(TrialOutcome::<()>::ok(-a.get_f64("dense_units")? / 512.0)),
//!     &SearchConfig::default().with_seed(0),
//!     &mut trials,
//! )
//! .unwrap();
//!
//! assert_eq!(trials.len(), 10);
//! assert!(outcome.best.loss.unwrap() >= -1.0);
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

mod algorithm;
mod error;
mod minimize;
mod space;
mod tpe;
mod trial;

// Re-export search space types
pub use space::{Assignment, ParameterDomain, ParameterValue, SearchSpace};

// Re-export algorithms
pub use algorithm::Algorithm;
pub use tpe::{TpeConfig, TpeSampler};

// Re-export trial history
pub use trial::{TrialOutcome, TrialRecord, TrialStatus, Trials};

// Re-export driver
pub use minimize::{SearchConfig, SearchOutcome, minimize};

// Re-export error types
pub use error::{Result, SearchError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        Algorithm, Assignment, ParameterDomain, ParameterValue, SearchConfig, SearchError,
        SearchOutcome, SearchSpace, TpeConfig, TrialOutcome, TrialRecord, TrialStatus, Trials,
        minimize,
    };
}
