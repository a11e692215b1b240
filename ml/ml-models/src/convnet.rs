//! Convolutional image classifier with tunable widths.

use burn::module::Module;
use burn::nn;
use burn::nn::PaddingConfig2d;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::Backend;
use burn::tensor::Tensor;
use burn::tensor::activation::{relu, softmax};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Models that map a batch of images to class logits.
///
/// The trainer is written against this trait so it can drive any
/// architecture, not just [`ConvNet`].
pub trait ImageClassifier<B: Backend> {
    /// Computes logits `[batch, num_classes]` for images
    /// `[batch, channels, height, width]`.
    fn logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;
}

/// Configuration for [`ConvNet`].
///
/// The filter counts and dense width are the tunable slots; the rest of the
/// topology is fixed.
///
/// # Example
///
/// ```
/// use ml_models::ConvNetConfig;
///
/// let config = ConvNetConfig::cifar10(32, 64, 256);
/// assert_eq!(config.flattened_features(), 64 * 8 * 8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvNetConfig {
    /// Input channels.
    pub input_channels: usize,

    /// Input height in pixels.
    pub input_height: usize,

    /// Input width in pixels.
    pub input_width: usize,

    /// Filters in the first convolution block.
    pub conv1_filters: usize,

    /// Filters in the second convolution block.
    pub conv2_filters: usize,

    /// Square kernel size of both convolutions (odd, same padding).
    pub kernel_size: usize,

    /// Units in the dense block.
    pub dense_units: usize,

    /// Dropout probability after the dense block.
    pub dropout: f64,

    /// Number of output classes.
    pub num_classes: usize,
}

impl Default for ConvNetConfig {
    fn default() -> Self {
        Self::cifar10(32, 64, 256)
    }
}

impl ConvNetConfig {
    /// Creates a configuration for 3x32x32 inputs and 10 classes.
    #[must_use]
    pub const fn cifar10(conv1_filters: usize, conv2_filters: usize, dense_units: usize) -> Self {
        Self {
            input_channels: 3,
            input_height: 32,
            input_width: 32,
            conv1_filters,
            conv2_filters,
            kernel_size: 3,
            dense_units,
            dropout: 0.5,
            num_classes: 10,
        }
    }

    /// Sets the input shape.
    #[must_use]
    pub const fn with_input(mut self, channels: usize, height: usize, width: usize) -> Self {
        self.input_channels = channels;
        self.input_height = height;
        self.input_width = width;
        self
    }

    /// Sets the number of classes.
    #[must_use]
    pub const fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    /// Sets the dropout probability.
    #[must_use]
    pub const fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Number of features entering the dense block.
    ///
    /// Each block halves the spatial size (floor).
    #[must_use]
    pub const fn flattened_features(&self) -> usize {
        self.conv2_filters * (self.input_height / 4) * (self.input_width / 4)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.input_channels == 0 {
            return Err(ModelError::invalid_config("input_channels must be > 0"));
        }
        if self.input_height < 4 || self.input_width < 4 {
            return Err(ModelError::invalid_config(format!(
                "input must be at least 4x4 to survive two poolings, got {}x{}",
                self.input_height, self.input_width
            )));
        }
        if self.conv1_filters == 0 || self.conv2_filters == 0 {
            return Err(ModelError::invalid_config("filter counts must be > 0"));
        }
        if self.kernel_size % 2 == 0 {
            return Err(ModelError::invalid_config(format!(
                "kernel_size must be odd for same padding, got {}",
                self.kernel_size
            )));
        }
        if self.dense_units == 0 {
            return Err(ModelError::invalid_config("dense_units must be > 0"));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ModelError::invalid_config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.num_classes < 2 {
            return Err(ModelError::invalid_config("num_classes must be >= 2"));
        }
        Ok(())
    }
}

/// Two convolution blocks, a dense block and a classification head.
///
/// Architecture:
///
/// ```text
/// Conv3x3(conv1_filters) -> ReLU -> BatchNorm -> MaxPool2x2
/// Conv3x3(conv2_filters) -> ReLU -> BatchNorm -> MaxPool2x2
/// Flatten -> Linear(dense_units) -> ReLU -> Dropout
/// Linear(num_classes) -> (softmax)
/// ```
///
/// # Example
///
/// ```
/// use burn::prelude::Backend;
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
/// use ml_models::{ConvNet, ConvNetConfig};
///
/// type B = NdArray<f32>;
///
/// let device = <B as Backend>::Device::default();
/// let config = ConvNetConfig::cifar10(8, 8, 16).with_input(3, 8, 8);
/// let model = ConvNet::<B>::new(config, &device).unwrap();
///
/// let logits = model.forward(Tensor::zeros([2, 3, 8, 8], &device));
/// assert_eq!(logits.dims(), [2, 10]);
/// ```
#[derive(Debug, Module)]
pub struct ConvNet<B: Backend> {
    conv1: Conv2d<B>,
    norm1: nn::BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    norm2: nn::BatchNorm<B, 2>,
    pool: MaxPool2d,
    dense: nn::Linear<B>,
    dropout: nn::Dropout,
    output: nn::Linear<B>,
}

impl<B: Backend> ConvNet<B> {
    /// Creates a freshly initialized network.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: ConvNetConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        let kernel = [config.kernel_size, config.kernel_size];

        let conv1 = Conv2dConfig::new([config.input_channels, config.conv1_filters], kernel)
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let norm1 = nn::BatchNormConfig::new(config.conv1_filters).init(device);
        let conv2 = Conv2dConfig::new([config.conv1_filters, config.conv2_filters], kernel)
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let norm2 = nn::BatchNormConfig::new(config.conv2_filters).init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        let dense =
            nn::LinearConfig::new(config.flattened_features(), config.dense_units).init(device);
        let dropout = nn::DropoutConfig::new(config.dropout).init();
        let output = nn::LinearConfig::new(config.dense_units, config.num_classes).init(device);

        Ok(Self {
            conv1,
            norm1,
            conv2,
            norm2,
            pool,
            dense,
            dropout,
            output,
        })
    }

    /// Runs the forward pass.
    ///
    /// # Arguments
    ///
    /// - `images`: Input tensor of shape `[batch, channels, height, width]`
    ///
    /// # Returns
    ///
    /// Logits of shape `[batch, num_classes]` (not probabilities).
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(images);
        let x = self.norm1.forward(relu(x));
        let x = self.pool.forward(x);

        let x = self.conv2.forward(x);
        let x = self.norm2.forward(relu(x));
        let x = self.pool.forward(x);

        let x = x.flatten::<2>(1, 3);
        let x = relu(self.dense.forward(x));
        let x = self.dropout.forward(x);
        self.output.forward(x)
    }

    /// Runs the forward pass and applies softmax over classes.
    pub fn forward_probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }
}

impl<B: Backend> ImageClassifier<B> for ConvNet<B> {
    fn logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Distribution, TensorData};
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn small() -> ConvNetConfig {
        ConvNetConfig::cifar10(4, 8, 16).with_input(3, 8, 8)
    }

    #[test]
    fn config_default() {
        let config = ConvNetConfig::default();
        assert_eq!(config.input_channels, 3);
        assert_eq!(config.input_height, 32);
        assert_eq!(config.num_classes, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_flattened_features() {
        assert_eq!(small().flattened_features(), 8 * 2 * 2);
        let odd = small().with_input(1, 10, 6);
        assert_eq!(odd.flattened_features(), 8 * 2 * 1);
    }

    #[test]
    fn config_validation() {
        assert!(small().with_input(3, 2, 8).validate().is_err());
        assert!(small().with_dropout(1.0).validate().is_err());
        assert!(small().with_num_classes(1).validate().is_err());

        let mut config = small();
        config.kernel_size = 4;
        assert!(config.validate().is_err());

        let mut config = small();
        config.dense_units = 0;
        assert!(matches!(
            config.validate(),
            Err(ModelError::InvalidConfig(_))
        ));
    }

    #[test]
    fn config_serialization() {
        let config = small();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ConvNetConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn new_rejects_invalid_config() {
        let device = <TestBackend as Backend>::Device::default();
        let config = small().with_input(0, 8, 8);
        assert!(ConvNet::<TestBackend>::new(config, &device).is_err());
    }

    #[test]
    fn forward_shape() {
        let device = <TestBackend as Backend>::Device::default();
        let model = ConvNet::<TestBackend>::new(small(), &device).unwrap();

        let input = Tensor::<TestBackend, 4>::random([5, 3, 8, 8], Distribution::Default, &device);
        let output = model.forward(input);
        assert_eq!(output.dims(), [5, 10]);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let device = <TestBackend as Backend>::Device::default();
        let model = ConvNet::<TestBackend>::new(small(), &device).unwrap();

        let input = Tensor::<TestBackend, 4>::random([3, 3, 8, 8], Distribution::Default, &device);
        let probs = model.forward_probabilities(input);
        let sums: Vec<f32> = probs.sum_dim(1).into_data().to_vec().unwrap();
        assert_eq!(sums.len(), 3);
        for s in sums {
            assert!((s - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn trait_matches_forward() {
        let device = <TestBackend as Backend>::Device::default();
        let model = ConvNet::<TestBackend>::new(small(), &device).unwrap();
        let data = TensorData::new(vec![0.5f32; 3 * 8 * 8], [1, 3, 8, 8]);
        let input = Tensor::<TestBackend, 4>::from_data(data, &device);

        let a: Vec<f32> = model.forward(input.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = model.logits(input).into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parameter_count_grows_with_width() {
        let device = <TestBackend as Backend>::Device::default();
        let narrow = ConvNet::<TestBackend>::new(small(), &device).unwrap();
        let mut wide_config = small();
        wide_config.dense_units = 64;
        let wide = ConvNet::<TestBackend>::new(wide_config, &device).unwrap();
        assert!(wide.num_params() > narrow.num_params());
    }
}
