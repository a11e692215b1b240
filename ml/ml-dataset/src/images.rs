//! Labeled image partitions.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};

/// Number of CIFAR-10 classes.
pub const NUM_CLASSES: usize = 10;

/// CIFAR-10 class names, indexed by class id.
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// Channel-first image shape.
///
/// # Example
///
/// ```
/// use ml_dataset::ImageShape;
///
/// let shape = ImageShape::CIFAR10;
/// assert_eq!(shape.len(), 3 * 32 * 32);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    /// Number of channels.
    pub channels: usize,
    /// Height in pixels.
    pub height: usize,
    /// Width in pixels.
    pub width: usize,
}

impl ImageShape {
    /// CIFAR-10 images: 3 channels, 32x32.
    pub const CIFAR10: Self = Self::new(3, 32, 32);

    /// Creates a new image shape.
    #[must_use]
    pub const fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Number of values in one image.
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub const fn len(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Number of values in one channel plane.
    #[must_use]
    pub const fn plane(&self) -> usize {
        self.height * self.width
    }

    /// Returns `true` if every dimension is positive.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.channels > 0 && self.height > 0 && self.width > 0
    }

    /// Returns the shape as a `[channels, height, width]` array.
    #[must_use]
    pub const fn dims(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }
}

impl Default for ImageShape {
    fn default() -> Self {
        Self::CIFAR10
    }
}

/// Normalizes raw 8-bit pixels into `[0, 1]`.
#[must_use]
pub fn normalize_pixels(raw: &[u8]) -> Vec<f32> {
    raw.iter().map(|&p| f32::from(p) / 255.0).collect()
}

/// Encodes a class id as a one-hot vector.
///
/// # Errors
///
/// Returns [`DatasetError::ClassOutOfRange`] if `class >= num_classes`.
///
/// # Example
///
/// ```
/// use ml_dataset::one_hot;
///
/// let v = one_hot(2, 4).unwrap();
/// assert_eq!(v, vec![0.0, 0.0, 1.0, 0.0]);
/// ```
pub fn one_hot(class: usize, num_classes: usize) -> Result<Vec<f32>> {
    if class >= num_classes {
        return Err(DatasetError::class_out_of_range(class, num_classes));
    }
    let mut row = vec![0.0; num_classes];
    row[class] = 1.0;
    Ok(row)
}

/// A partition of images with one-hot labels.
///
/// Pixels are stored channel-first, one image after another, so image `i`
/// occupies `pixels[i * shape.len()..(i + 1) * shape.len()]`. Labels are
/// stored row-major with `num_classes` entries per image.
///
/// # Example
///
/// ```
/// use ml_dataset::{ImageShape, LabeledImages};
///
/// let shape = ImageShape::new(1, 2, 2);
/// let images = LabeledImages::from_raw(shape, &[0, 255, 0, 255, 51, 51, 51, 51], &[1, 0], 2).unwrap();
///
/// assert_eq!(images.len(), 2);
/// assert_eq!(images.class_of(0), 1);
/// assert!((images.image(1)[0] - 0.2).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledImages {
    shape: ImageShape,
    num_classes: usize,
    pixels: Vec<f32>,
    labels: Vec<f32>,
}

impl LabeledImages {
    /// Creates a partition from already normalized pixels and one-hot labels.
    ///
    /// # Errors
    ///
    /// Returns an error if the shape is invalid or buffer lengths disagree.
    pub fn new(
        shape: ImageShape,
        num_classes: usize,
        pixels: Vec<f32>,
        labels: Vec<f32>,
    ) -> Result<Self> {
        if !shape.is_valid() {
            return Err(DatasetError::invalid_shape(
                shape.channels,
                shape.height,
                shape.width,
            ));
        }
        if num_classes == 0 {
            return Err(DatasetError::validation("num_classes must be > 0"));
        }
        if pixels.len() % shape.len() != 0 {
            return Err(DatasetError::length_mismatch(
                "pixels",
                pixels.len().div_ceil(shape.len()) * shape.len(),
                pixels.len(),
            ));
        }
        let count = pixels.len() / shape.len();
        if labels.len() != count * num_classes {
            return Err(DatasetError::length_mismatch(
                "labels",
                count * num_classes,
                labels.len(),
            ));
        }

        Ok(Self {
            shape,
            num_classes,
            pixels,
            labels,
        })
    }

    /// Creates a partition from raw 8-bit pixels and class ids.
    ///
    /// Pixels are divided by 255 and class ids are one-hot encoded.
    ///
    /// # Errors
    ///
    /// Returns an error if lengths disagree or a class id is out of range.
    pub fn from_raw(
        shape: ImageShape,
        raw_pixels: &[u8],
        classes: &[u8],
        num_classes: usize,
    ) -> Result<Self> {
        if raw_pixels.len() != classes.len() * shape.len() {
            return Err(DatasetError::length_mismatch(
                "pixels",
                classes.len() * shape.len(),
                raw_pixels.len(),
            ));
        }

        let mut labels = Vec::with_capacity(classes.len() * num_classes);
        for &class in classes {
            labels.extend(one_hot(usize::from(class), num_classes)?);
        }

        Self::new(shape, num_classes, normalize_pixels(raw_pixels), labels)
    }

    /// Creates an empty partition.
    #[must_use]
    pub const fn empty(shape: ImageShape, num_classes: usize) -> Self {
        Self {
            shape,
            num_classes,
            pixels: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Number of images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pixels.len() / self.shape.len()
    }

    /// Returns `true` if the partition holds no images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Image shape.
    #[must_use]
    pub const fn shape(&self) -> ImageShape {
        self.shape
    }

    /// Number of label classes.
    #[must_use]
    pub const fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// All pixel values, image after image.
    #[must_use]
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    /// All one-hot label values, row after row.
    #[must_use]
    pub fn labels(&self) -> &[f32] {
        &self.labels
    }

    /// Pixels of image `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[must_use]
    pub fn image(&self, index: usize) -> &[f32] {
        let n = self.shape.len();
        &self.pixels[index * n..(index + 1) * n]
    }

    /// One-hot label of image `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[must_use]
    pub fn label(&self, index: usize) -> &[f32] {
        &self.labels[index * self.num_classes..(index + 1) * self.num_classes]
    }

    /// Class id of image `index` (position of the hot coordinate).
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[must_use]
    pub fn class_of(&self, index: usize) -> usize {
        self.label(index)
            .iter()
            .position(|&v| v > 0.5)
            .unwrap_or(0)
    }

    /// Copies a contiguous range of images into a new partition.
    ///
    /// The range is clamped to the partition length.
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        let n = self.shape.len();
        Self {
            shape: self.shape,
            num_classes: self.num_classes,
            pixels: self.pixels[start * n..end * n].to_vec(),
            labels: self.labels[start * self.num_classes..end * self.num_classes].to_vec(),
        }
    }

    /// Keeps at most the first `limit` images.
    #[must_use]
    pub fn truncated(mut self, limit: usize) -> Self {
        if limit < self.len() {
            self.pixels.truncate(limit * self.shape.len());
            self.labels.truncate(limit * self.num_classes);
        }
        self
    }

    /// Appends another partition with the same shape and class count.
    ///
    /// # Errors
    ///
    /// Returns an error if shapes or class counts differ.
    pub fn extend(&mut self, other: Self) -> Result<()> {
        if other.shape != self.shape || other.num_classes != self.num_classes {
            return Err(DatasetError::validation(format!(
                "cannot merge {}x{}x{}/{} with {}x{}x{}/{}",
                self.shape.channels,
                self.shape.height,
                self.shape.width,
                self.num_classes,
                other.shape.channels,
                other.shape.height,
                other.shape.width,
                other.num_classes,
            )));
        }
        self.pixels.extend(other.pixels);
        self.labels.extend(other.labels);
        Ok(())
    }
}

/// Train and test partitions of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Training partition (validation is carved out of this at fit time).
    pub train: LabeledImages,
    /// Held-out test partition.
    pub test: LabeledImages,
}

impl Dataset {
    /// Creates a dataset from its partitions.
    #[must_use]
    pub const fn new(train: LabeledImages, test: LabeledImages) -> Self {
        Self { train, test }
    }

    /// Image shape of the training partition.
    #[must_use]
    pub const fn shape(&self) -> ImageShape {
        self.train.shape()
    }

    /// Number of classes of the training partition.
    #[must_use]
    pub const fn num_classes(&self) -> usize {
        self.train.num_classes()
    }

    /// Splits into `(train, test)`.
    #[must_use]
    pub fn into_parts(self) -> (LabeledImages, LabeledImages) {
        (self.train, self.test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn tiny() -> LabeledImages {
        let shape = ImageShape::new(1, 1, 2);
        LabeledImages::from_raw(shape, &[0, 255, 10, 20, 30, 40], &[0, 1, 2], 3).unwrap()
    }

    #[test]
    fn shape_cifar10() {
        let shape = ImageShape::CIFAR10;
        assert_eq!(shape.dims(), [3, 32, 32]);
        assert_eq!(shape.len(), 3072);
        assert_eq!(shape.plane(), 1024);
        assert!(shape.is_valid());
        assert!(!ImageShape::new(0, 32, 32).is_valid());
    }

    #[test]
    fn one_hot_valid() {
        assert_eq!(one_hot(0, 3).unwrap(), vec![1.0, 0.0, 0.0]);
        assert_eq!(one_hot(9, 10).unwrap()[9], 1.0);
    }

    #[test]
    fn one_hot_out_of_range() {
        assert!(matches!(
            one_hot(10, 10),
            Err(DatasetError::ClassOutOfRange { class: 10, .. })
        ));
    }

    #[test]
    fn normalize_bounds() {
        let v = normalize_pixels(&[0, 128, 255]);
        assert_relative_eq!(v[0], 0.0);
        assert_relative_eq!(v[1], 128.0 / 255.0);
        assert_relative_eq!(v[2], 1.0);
    }

    #[test]
    fn from_raw_accessors() {
        let images = tiny();
        assert_eq!(images.len(), 3);
        assert_eq!(images.num_classes(), 3);
        assert_eq!(images.label(1), &[0.0, 1.0, 0.0]);
        assert_eq!(images.class_of(2), 2);
        assert_relative_eq!(images.image(0)[1], 1.0);
    }

    #[test]
    fn from_raw_length_mismatch() {
        let shape = ImageShape::new(1, 1, 2);
        let result = LabeledImages::from_raw(shape, &[0, 1, 2], &[0, 1], 3);
        assert!(matches!(result, Err(DatasetError::LengthMismatch { .. })));
    }

    #[test]
    fn new_rejects_label_mismatch() {
        let shape = ImageShape::new(1, 1, 1);
        let result = LabeledImages::new(shape, 2, vec![0.5, 0.5], vec![1.0, 0.0]);
        assert!(matches!(
            result,
            Err(DatasetError::LengthMismatch { what: "labels", .. })
        ));
    }

    #[test]
    fn slice_clamps_range() {
        let images = tiny();
        let tail = images.slice(1..10);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail.class_of(0), 1);
    }

    #[test]
    fn truncated_and_extend() {
        let mut images = tiny().truncated(2);
        assert_eq!(images.len(), 2);
        images.extend(tiny()).unwrap();
        assert_eq!(images.len(), 5);

        let other = LabeledImages::empty(ImageShape::new(3, 1, 2), 3);
        assert!(images.extend(other).is_err());
    }

    #[test]
    fn dataset_parts() {
        let dataset = Dataset::new(tiny(), tiny().truncated(1));
        assert_eq!(dataset.shape(), ImageShape::new(1, 1, 2));
        assert_eq!(dataset.num_classes(), 3);
        let (train, test) = dataset.into_parts();
        assert_eq!(train.len(), 3);
        assert_eq!(test.len(), 1);
    }

    proptest! {
        #[test]
        fn raw_images_are_normalized_and_one_hot(
            classes in proptest::collection::vec(0u8..10, 1..16),
            seed in any::<u8>(),
        ) {
            let shape = ImageShape::new(1, 2, 2);
            let raw: Vec<u8> = (0..classes.len() * shape.len())
                .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
                .collect();
            let images = LabeledImages::from_raw(shape, &raw, &classes, NUM_CLASSES).unwrap();

            prop_assert!(images.pixels().iter().all(|&p| (0.0..=1.0).contains(&p)));
            for i in 0..images.len() {
                let row = images.label(i);
                prop_assert_eq!(row.len(), NUM_CLASSES);
                prop_assert_eq!(row.iter().filter(|&&v| v == 1.0).count(), 1);
                prop_assert_eq!(row.iter().filter(|&&v| v == 0.0).count(), NUM_CLASSES - 1);
                prop_assert_eq!(images.class_of(i), usize::from(classes[i]));
            }
        }
    }
}
