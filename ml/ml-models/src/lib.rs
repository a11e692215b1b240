//! Burn image classifier and checkpoint persistence.
//!
//! This crate provides the convolutional network tuned by the search,
//! along with checkpoint save/load functionality.
//!
//! # Model Architectures
//!
//! - [`ConvNet`] - Two conv+norm blocks, a dense block and a softmax head
//! - [`ImageClassifier`] - Trait the trainer drives
//!
//! # Checkpoint Persistence
//!
//! Models can save and load their weights using Burn's recorder system:
//! - Binary format (compact, fast)
//! - JSON format (human-readable, debuggable)
//!
//! A tuning run writes the winner with [`save_checkpoint`] and reads it back
//! with [`load_checkpoint`] into a network rebuilt from its recorded
//! [`ConvNetConfig`]; the format follows the file extension.
//!
//! # Backend Support
//!
//! Models are generic over Burn backends. Training uses
//! `Autodiff<NdArray>`; evaluation runs on the inner `NdArray` backend.
//!
//! # Example
//!
//! ```ignore
//! use ml_models::{ConvNet, ConvNetConfig};
//!
//! let config = ConvNetConfig::cifar10(32, 64, 256);
//! let model = ConvNet::<MyBackend>::new(config, &device)?;
//!
//! let probs = model.forward_probabilities(images);
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

mod checkpoint;
mod convnet;
mod error;

// Re-export model types
pub use convnet::{ConvNet, ConvNetConfig, ImageClassifier};

// Re-export checkpoint utilities
pub use checkpoint::{CheckpointFormat, load_checkpoint, save_checkpoint};

// Re-export error types
pub use error::{ModelError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        CheckpointFormat, ConvNet, ConvNetConfig, ImageClassifier, ModelError, load_checkpoint,
        save_checkpoint,
    };
}
