//! Turns labeled image partitions into device tensors.

use burn::prelude::Backend;
use burn::tensor::{Tensor, TensorData};
use ml_dataset::LabeledImages;

/// A mini-batch of images and one-hot targets on a device.
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// Images `[batch, channels, height, width]`.
    pub images: Tensor<B, 4>,

    /// One-hot targets `[batch, num_classes]`.
    pub targets: Tensor<B, 2>,
}

impl<B: Backend> ImageBatch<B> {
    /// Gathers the images at `indices` into a batch.
    ///
    /// Indices must be in range for `data`.
    #[must_use]
    pub fn from_indices(data: &LabeledImages, indices: &[usize], device: &B::Device) -> Self {
        let shape = data.shape();
        let classes = data.num_classes();
        let mut pixels = Vec::with_capacity(indices.len() * shape.len());
        let mut labels = Vec::with_capacity(indices.len() * classes);
        for &i in indices {
            pixels.extend_from_slice(data.image(i));
            labels.extend_from_slice(data.label(i));
        }

        let [c, h, w] = shape.dims();
        let images = Tensor::from_data(TensorData::new(pixels, [indices.len(), c, h, w]), device);
        let targets = Tensor::from_data(TensorData::new(labels, [indices.len(), classes]), device);
        Self { images, targets }
    }

    /// Builds a batch from the contiguous range `start..end`.
    #[must_use]
    pub fn from_range(data: &LabeledImages, start: usize, end: usize, device: &B::Device) -> Self {
        let indices: Vec<usize> = (start..end).collect();
        Self::from_indices(data, &indices, device)
    }

    /// Number of images in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.dims()[0]
    }

    /// Returns `true` if the batch holds no images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
