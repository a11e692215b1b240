//! Dataset summary and invariant checks.

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};
use crate::images::LabeledImages;

/// Summary statistics for a partition.
///
/// Provides aggregate information about class balance and pixel range,
/// useful for validation and debugging.
///
/// # Example
///
/// ```
/// use ml_dataset::{DatasetSummary, ImageShape, LabeledImages};
///
/// let images = LabeledImages::from_raw(ImageShape::new(1, 1, 2), &[0, 255, 51, 51], &[1, 1], 3).unwrap();
/// let summary = DatasetSummary::from_images(&images);
///
/// assert_eq!(summary.total_samples, 2);
/// assert_eq!(summary.class_counts, vec![0, 2, 0]);
/// assert!((summary.max_pixel - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Total number of samples.
    pub total_samples: usize,

    /// Samples per class id.
    pub class_counts: Vec<usize>,

    /// Smallest pixel value.
    pub min_pixel: f32,

    /// Largest pixel value.
    pub max_pixel: f32,

    /// Mean pixel value.
    pub mean_pixel: f32,
}

impl DatasetSummary {
    /// Creates a summary of a partition.
    #[must_use]
    pub fn from_images(images: &LabeledImages) -> Self {
        if images.is_empty() {
            return Self {
                class_counts: vec![0; images.num_classes()],
                ..Self::default()
            };
        }

        let mut class_counts = vec![0; images.num_classes()];
        for i in 0..images.len() {
            class_counts[images.class_of(i)] += 1;
        }

        let pixels = images.pixels();
        let (min_pixel, max_pixel, sum) = pixels.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0.0f64),
            |(lo, hi, sum), &p| (lo.min(p), hi.max(p), sum + f64::from(p)),
        );

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let mean_pixel = (sum / pixels.len() as f64) as f32;

        Self {
            total_samples: images.len(),
            class_counts,
            min_pixel,
            max_pixel,
            mean_pixel,
        }
    }

    /// Fraction of samples in each class.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn class_distribution(&self) -> Vec<f32> {
        if self.total_samples == 0 {
            return vec![0.0; self.class_counts.len()];
        }
        self.class_counts
            .iter()
            .map(|&c| c as f32 / self.total_samples as f32)
            .collect()
    }

    /// Returns a human-readable summary.
    #[must_use]
    #[allow(clippy::let_underscore_must_use)] // String::write_fmt is infallible
    pub fn summary(&self) -> String {
        use std::fmt::Write;

        let mut s = String::new();
        let _ = writeln!(s, "Samples: {}", self.total_samples);
        let _ = writeln!(
            s,
            "Pixels: min {:.3}, max {:.3}, mean {:.3}",
            self.min_pixel, self.max_pixel, self.mean_pixel
        );
        let counts: Vec<String> = self.class_counts.iter().map(ToString::to_string).collect();
        let _ = writeln!(s, "Class counts: [{}]", counts.join(", "));
        s
    }
}

/// Checks the partition invariants: one-hot labels and pixels in `[0, 1]`.
///
/// # Errors
///
/// Returns [`DatasetError::Validation`] naming the first offending sample.
pub fn validate_images(images: &LabeledImages) -> Result<()> {
    for i in 0..images.len() {
        let row = images.label(i);
        let ones = row.iter().filter(|&&v| v == 1.0).count();
        let zeros = row.iter().filter(|&&v| v == 0.0).count();
        if ones != 1 || zeros != row.len() - 1 {
            return Err(DatasetError::validation(format!(
                "label of sample {i} is not one-hot"
            )));
        }

        if let Some(p) = images
            .image(i)
            .iter()
            .find(|p| !(0.0..=1.0).contains(*p))
        {
            return Err(DatasetError::validation(format!(
                "sample {i} has pixel {p} outside [0, 1]"
            )));
        }
    }
    Ok(())
}
