//! Train/validation splitting.

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};
use crate::images::LabeledImages;

/// Ratio for splitting datasets into train/validation sets.
///
/// The ratio specifies the proportion of data to use for training.
/// The remainder goes to validation.
///
/// # Example
///
/// ```
/// use ml_dataset::SplitRatio;
///
/// // 90% train, 10% validation
/// let ratio = SplitRatio::from_validation_fraction(0.1).unwrap();
/// assert!((ratio.train_ratio() - 0.9).abs() < 1e-6);
/// assert!((ratio.val_ratio() - 0.1).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatio {
    train: f32,
}

impl SplitRatio {
    /// Creates a split ratio from the training fraction.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InvalidSplitRatio`] unless `train` is in `(0, 1)`.
    pub fn new(train: f32) -> Result<Self> {
        if train > 0.0 && train < 1.0 {
            Ok(Self { train })
        } else {
            Err(DatasetError::invalid_split_ratio(train))
        }
    }

    /// Creates a split ratio from the validation fraction.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::InvalidSplitRatio`] unless `val` is in `(0, 1)`.
    pub fn from_validation_fraction(val: f32) -> Result<Self> {
        if val > 0.0 && val < 1.0 {
            Ok(Self { train: 1.0 - val })
        } else {
            Err(DatasetError::invalid_split_ratio(val))
        }
    }

    /// Returns the training ratio.
    #[must_use]
    pub const fn train_ratio(&self) -> f32 {
        self.train
    }

    /// Returns the validation ratio.
    #[must_use]
    pub fn val_ratio(&self) -> f32 {
        1.0 - self.train
    }

    /// Computes the split point for a given dataset size.
    ///
    /// The training side is `floor(total * train)`, so a 10% hold-out of
    /// 14 images keeps 12 for training. Both sides keep at least one sample
    /// when `total >= 2`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn split_point(&self, total: usize) -> usize {
        if total < 2 {
            return total;
        }
        // f32 ratios such as 0.9 sit just below their decimal value.
        let exact = total as f64 * f64::from(self.train);
        ((exact * (1.0 + 1e-6)).floor() as usize).clamp(1, total - 1)
    }

    /// 90/10 split, the default validation hold-out.
    pub const NINETY_TEN: Self = Self { train: 0.9 };

    /// Common 80/20 split.
    pub const EIGHTY_TWENTY: Self = Self { train: 0.8 };
}

impl Default for SplitRatio {
    fn default() -> Self {
        Self::NINETY_TEN
    }
}

/// Holds out the last part of a partition for validation.
///
/// No shuffling happens: the first `split_point` images train and the rest
/// validate, matching the usual `validation_split` semantics of fit loops.
///
/// # Example
///
/// ```
/// use ml_dataset::{ImageShape, LabeledImages, SplitRatio, split_tail};
///
/// let classes: Vec<u8> = (0..10).collect();
/// let images = LabeledImages::from_raw(ImageShape::new(1, 1, 1), &[0; 10], &classes, 10).unwrap();
///
/// let (train, val) = split_tail(&images, SplitRatio::NINETY_TEN);
/// assert_eq!(train.len(), 9);
/// assert_eq!(val.class_of(0), 9);
/// ```
#[must_use]
pub fn split_tail(images: &LabeledImages, ratio: SplitRatio) -> (LabeledImages, LabeledImages) {
    let split = ratio.split_point(images.len());
    (images.slice(0..split), images.slice(split..images.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImageShape;

    fn images(n: usize) -> LabeledImages {
        let classes: Vec<u8> = (0..n).map(|i| (i % 10) as u8).collect();
        let raw: Vec<u8> = (0..n).map(|i| i as u8).collect();
        LabeledImages::from_raw(ImageShape::new(1, 1, 1), &raw, &classes, 10).unwrap()
    }

    #[test]
    fn split_ratio_new() {
        let ratio = SplitRatio::new(0.8).unwrap();
        assert!((ratio.train_ratio() - 0.8).abs() < 1e-6);
        assert!((ratio.val_ratio() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn split_ratio_invalid() {
        assert!(SplitRatio::new(0.0).is_err());
        assert!(SplitRatio::new(1.0).is_err());
        assert!(SplitRatio::from_validation_fraction(-0.5).is_err());
        assert!(SplitRatio::from_validation_fraction(1.5).is_err());
    }

    #[test]
    fn split_ratio_split_point() {
        let ratio = SplitRatio::NINETY_TEN;
        assert_eq!(ratio.split_point(100), 90);
        assert_eq!(ratio.split_point(10), 9);
        assert_eq!(ratio.split_point(2), 1);
        assert_eq!(ratio.split_point(1), 1);
        assert_eq!(ratio.split_point(0), 0);
    }

    #[test]
    fn split_ratio_default() {
        assert_eq!(SplitRatio::default(), SplitRatio::NINETY_TEN);
    }

    #[test]
    fn split_ratio_serialization() {
        let ratio = SplitRatio::EIGHTY_TWENTY;
        let json = serde_json::to_string(&ratio).unwrap();
        let parsed: SplitRatio = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ratio);
    }

    #[test]
    fn split_tail_keeps_order() {
        let data = images(20);
        let (train, val) = split_tail(&data, SplitRatio::NINETY_TEN);
        assert_eq!(train.len(), 18);
        assert_eq!(val.len(), 2);
        assert_eq!(train.class_of(0), 0);
        assert_eq!(val.class_of(0), 8);
        assert_eq!(val.class_of(1), 9);
    }

    #[test]
    fn split_point_truncates() {
        let ratio = SplitRatio::from_validation_fraction(0.1).unwrap();
        assert_eq!(ratio.split_point(14), 12);
        assert_eq!(ratio.split_point(19), 17);
        assert_eq!(ratio.split_point(50_000), 45_000);
        assert_eq!(ratio.split_point(45_000), 40_500);
    }

    #[test]
    fn split_tail_holds_out_truncated_tail() {
        let data = images(14);
        let (train, val) = split_tail(&data, SplitRatio::NINETY_TEN);
        assert_eq!(train.len(), 12);
        assert_eq!(val.len(), 2);
        assert_eq!(val.class_of(0), 2);
    }

    #[test]
    fn split_empty() {
        let data = LabeledImages::empty(ImageShape::new(1, 1, 1), 10);
        let (train, val) = split_tail(&data, SplitRatio::default());
        assert!(train.is_empty());
        assert!(val.is_empty());
    }
}
