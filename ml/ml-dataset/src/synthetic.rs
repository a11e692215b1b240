//! Seeded synthetic image datasets.
//!
//! Each class is drawn as a diagonal stripe pattern: pixel `(y, x)` is bright
//! when `(y + x) % num_classes == class`. Uniform noise is added and the
//! result is clamped to `[0, 1]`. The classes are separable by a small
//! convolutional network, which makes the generator useful for smoke runs.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};
use crate::images::{Dataset, ImageShape, LabeledImages, NUM_CLASSES, one_hot};

/// Configuration for [`SyntheticDataset`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticDataset {
    /// Number of training images.
    pub train_samples: usize,
    /// Number of test images.
    pub test_samples: usize,
    /// Image shape.
    pub shape: ImageShape,
    /// Number of classes.
    pub num_classes: usize,
    /// Noise amplitude added to every pixel.
    pub noise: f32,
    /// Random seed.
    pub seed: u64,
}

impl Default for SyntheticDataset {
    fn default() -> Self {
        Self {
            train_samples: 512,
            test_samples: 128,
            shape: ImageShape::CIFAR10,
            num_classes: NUM_CLASSES,
            noise: 0.1,
            seed: 42,
        }
    }
}

impl SyntheticDataset {
    /// Creates a generator with the given partition sizes.
    #[must_use]
    pub fn new(train_samples: usize, test_samples: usize) -> Self {
        Self {
            train_samples,
            test_samples,
            ..Self::default()
        }
    }

    /// Sets the image shape.
    #[must_use]
    pub const fn with_shape(mut self, shape: ImageShape) -> Self {
        self.shape = shape;
        self
    }

    /// Sets the noise amplitude.
    #[must_use]
    pub const fn with_noise(mut self, noise: f32) -> Self {
        self.noise = noise;
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generates both partitions.
    ///
    /// # Errors
    ///
    /// Returns an error if the shape or class count is invalid.
    pub fn generate(&self) -> Result<Dataset> {
        if !self.shape.is_valid() {
            return Err(DatasetError::invalid_shape(
                self.shape.channels,
                self.shape.height,
                self.shape.width,
            ));
        }
        if self.num_classes == 0 {
            return Err(DatasetError::validation("num_classes must be > 0"));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let train = self.partition(self.train_samples, &mut rng)?;
        let test = self.partition(self.test_samples, &mut rng)?;
        Ok(Dataset::new(train, test))
    }

    fn partition(&self, count: usize, rng: &mut ChaCha8Rng) -> Result<LabeledImages> {
        let mut pixels = Vec::with_capacity(count * self.shape.len());
        let mut labels = Vec::with_capacity(count * self.num_classes);

        for i in 0..count {
            let class = i % self.num_classes;
            for _ in 0..self.shape.channels {
                for y in 0..self.shape.height {
                    for x in 0..self.shape.width {
                        let base = if (y + x) % self.num_classes == class {
                            0.9
                        } else {
                            0.1
                        };
                        let jitter = if self.noise > 0.0 {
                            rng.gen_range(-self.noise..=self.noise)
                        } else {
                            0.0
                        };
                        pixels.push(f32::clamp(base + jitter, 0.0, 1.0));
                    }
                }
            }
            labels.extend(one_hot(class, self.num_classes)?);
        }

        LabeledImages::new(self.shape, self.num_classes, pixels, labels)
    }
}
