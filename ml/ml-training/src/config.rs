//! Training configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainingError};

/// Configuration for a training run.
///
/// # Example
///
/// ```
/// use ml_training::TrainingConfig;
///
/// let config = TrainingConfig::default();
/// assert_eq!(config.epochs, 10);
/// assert_eq!(config.batch_size, 32);
/// assert!((config.validation_split - 0.1).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of training epochs.
    pub epochs: usize,

    /// Batch size.
    pub batch_size: usize,

    /// Optimizer configuration.
    pub optimizer: OptimizerConfig,

    /// Fraction of the training partition held out (from the end) for
    /// validation. `0.0` disables validation.
    pub validation_split: f32,

    /// Whether to shuffle data each epoch.
    pub shuffle: bool,

    /// Random seed for shuffling and weight initialization.
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::new(10)
    }
}

impl TrainingConfig {
    /// Creates a new training config with the given epochs.
    #[must_use]
    pub const fn new(epochs: usize) -> Self {
        Self {
            epochs,
            batch_size: 32,
            optimizer: OptimizerConfig::adam(1e-3),
            validation_split: 0.1,
            shuffle: true,
            seed: None,
        }
    }

    /// Sets the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the optimizer.
    #[must_use]
    pub const fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Sets the learning rate, keeping the optimizer type.
    #[must_use]
    pub const fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.optimizer.learning_rate = learning_rate;
        self
    }

    /// Sets the validation fraction.
    #[must_use]
    pub const fn with_validation_split(mut self, validation_split: f32) -> Self {
        self.validation_split = validation_split;
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Disables shuffling.
    #[must_use]
    pub const fn without_shuffle(mut self) -> Self {
        self.shuffle = false;
        self
    }

    /// Returns `true` if all values are valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(TrainingError::invalid_config("epochs must be > 0"));
        }
        if self.batch_size == 0 {
            return Err(TrainingError::invalid_config("batch_size must be > 0"));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(TrainingError::invalid_config(format!(
                "validation_split must be in [0, 1), got {}",
                self.validation_split
            )));
        }
        if !self.optimizer.is_valid() {
            return Err(TrainingError::invalid_config(format!(
                "invalid optimizer: {:?}",
                self.optimizer
            )));
        }
        Ok(())
    }
}

/// Optimizer configuration.
///
/// # Example
///
/// ```
/// use ml_training::{OptimizerConfig, OptimizerType};
///
/// let adam = OptimizerConfig::adam(1e-3);
/// assert_eq!(adam.optimizer_type, OptimizerType::Adam);
/// assert!((adam.learning_rate - 1e-3).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Learning rate.
    pub learning_rate: f64,

    /// Weight decay (L2 penalty; decoupled for `AdamW`).
    pub weight_decay: f32,

    /// Optimizer type.
    pub optimizer_type: OptimizerType,

    /// Momentum (for SGD with momentum).
    pub momentum: f64,

    /// Beta1 (for Adam).
    pub beta1: f32,

    /// Beta2 (for Adam).
    pub beta2: f32,

    /// Epsilon for numerical stability.
    pub epsilon: f32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::adam(1e-3)
    }
}

impl OptimizerConfig {
    /// Creates an Adam optimizer config.
    #[must_use]
    pub const fn adam(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            weight_decay: 0.0,
            optimizer_type: OptimizerType::Adam,
            momentum: 0.0,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }

    /// Creates an `AdamW` optimizer config.
    #[must_use]
    pub const fn adamw(learning_rate: f64, weight_decay: f32) -> Self {
        Self {
            weight_decay,
            optimizer_type: OptimizerType::AdamW,
            ..Self::adam(learning_rate)
        }
    }

    /// Creates an SGD optimizer config.
    #[must_use]
    pub const fn sgd(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            weight_decay: 0.0,
            optimizer_type: OptimizerType::Sgd,
            momentum: 0.0,
            beta1: 0.0,
            beta2: 0.0,
            epsilon: 1e-8,
        }
    }

    /// Creates an SGD with momentum optimizer config.
    #[must_use]
    pub const fn sgd_momentum(learning_rate: f64, momentum: f64) -> Self {
        Self {
            momentum,
            optimizer_type: OptimizerType::SgdMomentum,
            ..Self::sgd(learning_rate)
        }
    }

    /// Sets weight decay.
    #[must_use]
    pub const fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    /// Sets the learning rate.
    #[must_use]
    pub const fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Validates the configuration.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.learning_rate > 0.0
            && self.learning_rate.is_finite()
            && self.weight_decay >= 0.0
            && (0.0..=1.0).contains(&self.momentum)
            && (0.0..1.0).contains(&self.beta1)
            && (0.0..1.0).contains(&self.beta2)
            && self.epsilon > 0.0
    }
}

/// Type of optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerType {
    /// Stochastic Gradient Descent.
    Sgd,
    /// SGD with momentum.
    SgdMomentum,
    /// Adam optimizer.
    Adam,
    /// `AdamW` optimizer (Adam with decoupled weight decay).
    AdamW,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_config_default() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 10);
        assert_eq!(config.batch_size, 32);
        assert!(config.shuffle);
        assert!(config.is_valid());
    }

    #[test]
    fn training_config_builder() {
        let config = TrainingConfig::new(5)
            .with_batch_size(64)
            .with_learning_rate(0.01)
            .with_validation_split(0.2)
            .with_seed(42)
            .without_shuffle();

        assert_eq!(config.epochs, 5);
        assert_eq!(config.batch_size, 64);
        assert!((config.optimizer.learning_rate - 0.01).abs() < 1e-12);
        assert!((config.validation_split - 0.2).abs() < 1e-6);
        assert_eq!(config.seed, Some(42));
        assert!(!config.shuffle);
    }

    #[test]
    fn training_config_invalid() {
        assert!(TrainingConfig::new(0).validate().is_err());
        assert!(TrainingConfig::default().with_batch_size(0).validate().is_err());
        assert!(
            TrainingConfig::default()
                .with_validation_split(1.0)
                .validate()
                .is_err()
        );
        assert!(
            TrainingConfig::default()
                .with_learning_rate(0.0)
                .validate()
                .is_err()
        );
        assert!(
            TrainingConfig::default()
                .with_validation_split(0.0)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn optimizer_config_constructors() {
        let sgd = OptimizerConfig::sgd(0.01);
        assert_eq!(sgd.optimizer_type, OptimizerType::Sgd);
        assert!(sgd.is_valid());

        let momentum = OptimizerConfig::sgd_momentum(0.01, 0.9);
        assert_eq!(momentum.optimizer_type, OptimizerType::SgdMomentum);
        assert!((momentum.momentum - 0.9).abs() < 1e-12);

        let adamw = OptimizerConfig::adamw(1e-3, 1e-4);
        assert_eq!(adamw.optimizer_type, OptimizerType::AdamW);
        assert!((adamw.beta1 - 0.9).abs() < 1e-6);
        assert!(adamw.is_valid());
    }

    #[test]
    fn optimizer_config_invalid() {
        assert!(!OptimizerConfig::sgd_momentum(0.01, 1.5).is_valid());
        assert!(!OptimizerConfig::adam(-1.0).is_valid());
        assert!(!OptimizerConfig::adam(f64::NAN).is_valid());
    }

    #[test]
    fn config_serialization() {
        let config = TrainingConfig::default().with_seed(3);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"adam\""));
        let parsed: TrainingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn config_partial_json_uses_defaults() {
        let parsed: TrainingConfig = serde_json::from_str(r#"{"epochs": 3}"#).unwrap();
        assert_eq!(parsed.epochs, 3);
        assert_eq!(parsed.batch_size, 32);
    }
}
