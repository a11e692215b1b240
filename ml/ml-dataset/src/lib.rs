//! Image dataset handling for the CIFAR-10 tuner.
//!
//! This crate provides tools for working with labeled image datasets:
//!
//! # Dataset Types
//!
//! - [`LabeledImages`] - One partition of normalized images with one-hot labels
//! - [`Dataset`] - Train and test partitions
//! - [`ImageShape`] - Channel-first image dimensions
//!
//! # Data Loading
//!
//! - [`Cifar10Loader`] - Reads the CIFAR-10 binary distribution
//! - [`SyntheticDataset`] - Seeded, learnable stand-in data
//!
//! # Splits and Checks
//!
//! - [`split_tail`] - Hold out the last fraction for validation
//! - [`DatasetSummary`] - Class balance and pixel statistics
//! - [`validate_images`] - One-hot and pixel range invariants
//!
//! # Example
//!
//! ```
//! use ml_dataset::{ImageShape, SplitRatio, SyntheticDataset, split_tail, validate_images};
//!
//! let dataset = SyntheticDataset::new(100, 20)
//!     .with_shape(ImageShape::new(3, 8, 8))
//!     .generate()
//!     .unwrap();
//! validate_images(&dataset.train).unwrap();
//!
//! let (train, val) = split_tail(&dataset.train, SplitRatio::NINETY_TEN);
//! assert_eq!(train.len(), 90);
//! assert_eq!(val.len(), 10);
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

mod cifar;
mod error;
mod images;
mod splits;
mod summary;
mod synthetic;

// Re-export image types
pub use images::{
    CLASS_NAMES, Dataset, ImageShape, LabeledImages, NUM_CLASSES, normalize_pixels, one_hot,
};

// Re-export loaders
pub use cifar::{Cifar10Loader, RECORD_LEN, TEST_BATCH, TRAIN_BATCHES, parse_batch, read_batch};
pub use synthetic::SyntheticDataset;

// Re-export split utilities
pub use splits::{SplitRatio, split_tail};

// Re-export summary types
pub use summary::{DatasetSummary, validate_images};

// Re-export error types
pub use error::{DatasetError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        Cifar10Loader, Dataset, DatasetError, DatasetSummary, ImageShape, LabeledImages,
        NUM_CLASSES, SplitRatio, SyntheticDataset, split_tail, validate_images,
    };
}
