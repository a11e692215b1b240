//! Training loop implementation.

use std::time::Instant;

use burn::module::AutodiffModule;
use burn::optim::momentum::MomentumConfig;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, AdamWConfig, GradientsParams, Optimizer, SgdConfig};
use burn::prelude::Backend;
use burn::tensor::ElementConversion;
use burn::tensor::backend::AutodiffBackend;
use ml_dataset::{LabeledImages, SplitRatio, split_tail};
use ml_models::ImageClassifier;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::batcher::ImageBatch;
use crate::config::{OptimizerType, TrainingConfig};
use crate::error::{Result, TrainingError};
use crate::loss::{categorical_cross_entropy, correct_predictions};
use crate::metrics::{EpochMetrics, TrainingMetrics};

/// State of a training run.
///
/// # Example
///
/// ```
/// use ml_training::TrainingState;
///
/// let state = TrainingState::new();
/// assert_eq!(state.epoch, 0);
/// assert!(!state.is_finished());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    /// Current epoch (0-indexed).
    pub epoch: usize,

    /// Current batch within epoch.
    pub batch: usize,

    /// Total epochs to run.
    pub total_epochs: usize,

    /// Best validation accuracy seen.
    pub best_val_accuracy: Option<f32>,

    /// Whether training has finished.
    pub finished: bool,

    /// Accumulated metrics.
    pub metrics: TrainingMetrics,
}

impl Default for TrainingState {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingState {
    /// Creates a new training state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: 0,
            batch: 0,
            total_epochs: 0,
            best_val_accuracy: None,
            finished: false,
            metrics: TrainingMetrics::new(),
        }
    }

    /// Creates a training state for the given config.
    #[must_use]
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            total_epochs: config.epochs,
            finished: config.epochs == 0,
            ..Self::new()
        }
    }

    /// Returns true if training is finished.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advances to the next epoch.
    pub const fn next_epoch(&mut self) {
        self.epoch += 1;
        self.batch = 0;
        if self.epoch >= self.total_epochs {
            self.finished = true;
        }
    }

    /// Advances to the next batch.
    pub const fn next_batch(&mut self) {
        self.batch += 1;
    }

    /// Records a validation accuracy.
    ///
    /// Returns true if this is a new best.
    pub fn record_val_accuracy(&mut self, accuracy: f32) -> bool {
        let improved = self.best_val_accuracy.is_none_or(|best| accuracy > best);
        if improved {
            self.best_val_accuracy = Some(accuracy);
        }
        improved
    }

    /// Adds epoch metrics.
    pub fn add_epoch_metrics(&mut self, metrics: EpochMetrics) {
        self.metrics.add_epoch(metrics);
    }
}

/// Loss and accuracy of a model over a whole partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Sample-weighted mean cross-entropy.
    pub loss: f32,

    /// Fraction of samples classified correctly.
    pub accuracy: f32,

    /// Number of samples evaluated.
    pub samples: usize,
}

/// A trained model with the metrics collected while fitting it.
#[derive(Debug, Clone)]
pub struct Fitted<M> {
    /// The trained model.
    pub model: M,

    /// Per-epoch metrics.
    pub metrics: TrainingMetrics,
}

/// Evaluates `model` on `data` in batches of `batch_size`.
///
/// Run this on an inference model (`AutodiffModule::valid`) so dropout is
/// disabled and batch norm uses its running statistics.
///
/// # Errors
///
/// Returns [`TrainingError::Dataset`] if `data` is empty,
/// [`TrainingError::InvalidConfig`] if `batch_size` is zero and
/// [`TrainingError::NumericalInstability`] if the loss is not finite.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn evaluate<B, M>(
    model: &M,
    data: &LabeledImages,
    batch_size: usize,
    device: &B::Device,
) -> Result<Evaluation>
where
    B: Backend,
    M: ImageClassifier<B>,
{
    if data.is_empty() {
        return Err(TrainingError::dataset("cannot evaluate an empty partition"));
    }
    if batch_size == 0 {
        return Err(TrainingError::invalid_config("batch_size must be > 0"));
    }

    let mut loss_sum = 0.0_f64;
    let mut correct = 0;
    let mut start = 0;
    while start < data.len() {
        let end = (start + batch_size).min(data.len());
        let batch = ImageBatch::<B>::from_range(data, start, end, device);
        let n = batch.len();

        let logits = model.logits(batch.images);
        correct += correct_predictions(logits.clone(), batch.targets.clone());
        let loss: f32 = categorical_cross_entropy(logits, batch.targets)
            .into_scalar()
            .elem();
        loss_sum += f64::from(loss) * n as f64;
        start = end;
    }

    let loss = (loss_sum / data.len() as f64) as f32;
    if !loss.is_finite() {
        return Err(TrainingError::numerical_instability(format!(
            "evaluation loss is {loss}"
        )));
    }

    Ok(Evaluation {
        loss,
        accuracy: correct as f32 / data.len() as f32,
        samples: data.len(),
    })
}

/// Trainer for running training loops.
///
/// # Example
///
/// ```
/// use ml_training::{Trainer, TrainingConfig};
///
/// let config = TrainingConfig::new(10);
/// let trainer = Trainer::new(config);
///
/// assert_eq!(trainer.config().epochs, 10);
/// ```
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new(TrainingConfig::default())
    }
}

impl Trainer {
    /// Creates a new trainer with the given config.
    #[must_use]
    pub const fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Returns the training configuration.
    #[must_use]
    pub const fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Creates initial training state.
    #[must_use]
    pub fn initial_state(&self) -> TrainingState {
        TrainingState::from_config(&self.config)
    }

    /// Computes the number of batches for a dataset size.
    #[must_use]
    pub const fn num_batches(&self, dataset_size: usize) -> usize {
        if self.config.batch_size == 0 {
            0
        } else {
            dataset_size.div_ceil(self.config.batch_size)
        }
    }

    /// Gets batch indices for a given batch number.
    ///
    /// Returns (start, end) indices into the dataset.
    #[must_use]
    pub fn batch_indices(&self, batch: usize, dataset_size: usize) -> (usize, usize) {
        let start = (batch * self.config.batch_size).min(dataset_size);
        let end = ((batch + 1) * self.config.batch_size).min(dataset_size);
        (start, end)
    }

    /// Splits `data` into training and validation parts.
    ///
    /// The validation part is the tail of `data`; it is empty when
    /// `validation_split` is zero.
    ///
    /// # Errors
    ///
    /// Returns [`TrainingError::Dataset`] if the split fraction is rejected.
    pub fn split(&self, data: &LabeledImages) -> Result<(LabeledImages, LabeledImages)> {
        if self.config.validation_split <= 0.0 {
            return Ok((
                data.clone(),
                LabeledImages::empty(data.shape(), data.num_classes()),
            ));
        }
        let ratio = SplitRatio::from_validation_fraction(self.config.validation_split)?;
        Ok(split_tail(data, ratio))
    }

    /// Trains `model` on `data` with the configured optimizer.
    ///
    /// The tail of `data` is held out for validation according to
    /// `validation_split`. Validation runs on `model.valid()` after each
    /// epoch.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the training
    /// partition is empty, or the loss becomes non-finite.
    pub fn fit<B, M>(&self, model: M, data: &LabeledImages, device: &B::Device) -> Result<Fitted<M>>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + ImageClassifier<B>,
        M::InnerModule: ImageClassifier<B::InnerBackend>,
    {
        self.config.validate()?;
        let opt = &self.config.optimizer;
        let weight_decay =
            (opt.weight_decay > 0.0).then(|| WeightDecayConfig::new(opt.weight_decay));

        match opt.optimizer_type {
            OptimizerType::Adam => {
                let optim = AdamConfig::new()
                    .with_beta_1(opt.beta1)
                    .with_beta_2(opt.beta2)
                    .with_epsilon(opt.epsilon)
                    .with_weight_decay(weight_decay)
                    .init::<B, M>();
                self.fit_with(model, optim, data, device)
            }
            OptimizerType::AdamW => {
                let optim = AdamWConfig::new()
                    .with_beta_1(opt.beta1)
                    .with_beta_2(opt.beta2)
                    .with_epsilon(opt.epsilon)
                    .with_weight_decay(opt.weight_decay)
                    .init::<B, M>();
                self.fit_with(model, optim, data, device)
            }
            OptimizerType::Sgd => {
                let optim = SgdConfig::new()
                    .with_weight_decay(weight_decay)
                    .init::<B, M>();
                self.fit_with(model, optim, data, device)
            }
            OptimizerType::SgdMomentum => {
                let momentum = MomentumConfig::new()
                    .with_momentum(opt.momentum)
                    .with_dampening(0.0);
                let optim = SgdConfig::new()
                    .with_weight_decay(weight_decay)
                    .with_momentum(Some(momentum))
                    .init::<B, M>();
                self.fit_with(model, optim, data, device)
            }
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn fit_with<B, M, O>(
        &self,
        mut model: M,
        mut optim: O,
        data: &LabeledImages,
        device: &B::Device,
    ) -> Result<Fitted<M>>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + ImageClassifier<B>,
        M::InnerModule: ImageClassifier<B::InnerBackend>,
        O: Optimizer<M, B>,
    {
        let (train, val) = self.split(data)?;
        if train.is_empty() {
            return Err(TrainingError::dataset("training partition is empty"));
        }

        if let Some(seed) = self.config.seed {
            B::seed(seed);
        }
        let mut rng = self
            .config
            .seed
            .map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);

        let lr = self.config.optimizer.learning_rate;
        let batch_size = self.config.batch_size;
        let mut state = self.initial_state();
        let mut order: Vec<usize> = (0..train.len()).collect();

        debug!(
            train = train.len(),
            val = val.len(),
            batch_size,
            epochs = self.config.epochs,
            "Starting training"
        );

        while !state.is_finished() {
            let started = Instant::now();
            if self.config.shuffle {
                order.shuffle(&mut rng);
            }

            let mut loss_sum = 0.0_f64;
            let mut correct = 0;
            for batch_idx in 0..self.num_batches(train.len()) {
                let (start, end) = self.batch_indices(batch_idx, train.len());
                let batch = ImageBatch::<B>::from_indices(&train, &order[start..end], device);
                let n = batch.len();

                let logits = model.logits(batch.images);
                correct += correct_predictions(logits.clone().detach(), batch.targets.clone());
                let loss = categorical_cross_entropy(logits, batch.targets);
                let loss_value: f32 = loss.clone().into_scalar().elem();
                if !loss_value.is_finite() {
                    return Err(TrainingError::numerical_instability(format!(
                        "training loss is {loss_value} at epoch {} batch {batch_idx}",
                        state.epoch
                    )));
                }
                loss_sum += f64::from(loss_value) * n as f64;

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(lr, model, grads);
                state.next_batch();
            }

            let train_loss = (loss_sum / train.len() as f64) as f32;
            let train_accuracy = correct as f32 / train.len() as f32;
            let mut epoch = EpochMetrics::new(state.epoch, train_loss, train_accuracy)
                .with_learning_rate(lr)
                .with_train_time(started.elapsed().as_secs_f32())
                .with_samples(train.len(), (!val.is_empty()).then_some(val.len()));

            if !val.is_empty() {
                let val_started = Instant::now();
                let eval = evaluate::<B::InnerBackend, _>(&model.valid(), &val, batch_size, device)?;
                epoch = epoch
                    .with_validation(eval.loss, eval.accuracy)
                    .with_val_time(val_started.elapsed().as_secs_f32());
                if state.record_val_accuracy(eval.accuracy) {
                    debug!(epoch = state.epoch + 1, accuracy = eval.accuracy, "New best validation accuracy");
                }
            }

            info!(
                epoch = state.epoch + 1,
                epochs = state.total_epochs,
                train_loss,
                train_accuracy,
                val_loss = ?epoch.val_loss,
                val_accuracy = ?epoch.val_accuracy,
                "Epoch complete"
            );

            state.add_epoch_metrics(epoch);
            state.next_epoch();
        }

        debug!(summary = %state.metrics.summary(), "Training finished");
        Ok(Fitted {
            model,
            metrics: state.metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;
    use ml_dataset::{ImageShape, SyntheticDataset};
    use ml_models::{ConvNet, ConvNetConfig};

    type InferBackend = NdArray<f32>;
    type TrainBackend = Autodiff<InferBackend>;

    fn tiny_data() -> LabeledImages {
        SyntheticDataset::new(40, 10)
            .with_shape(ImageShape::new(3, 8, 8))
            .with_seed(7)
            .generate()
            .unwrap()
            .train
    }

    fn tiny_model() -> ConvNet<TrainBackend> {
        let device = <TrainBackend as Backend>::Device::default();
        let config = ConvNetConfig::cifar10(4, 4, 8).with_input(3, 8, 8);
        ConvNet::new(config, &device).unwrap()
    }

    #[test]
    fn training_state_new() {
        let state = TrainingState::new();
        assert_eq!(state.epoch, 0);
        assert_eq!(state.batch, 0);
        assert!(!state.is_finished());
        assert!(state.best_val_accuracy.is_none());
    }

    #[test]
    fn training_state_next_epoch() {
        let mut state = TrainingState::from_config(&TrainingConfig::new(2));
        state.next_batch();
        state.next_batch();
        assert_eq!(state.batch, 2);

        state.next_epoch();
        assert_eq!(state.epoch, 1);
        assert_eq!(state.batch, 0);
        assert!(!state.is_finished());

        state.next_epoch();
        assert!(state.is_finished());
    }

    #[test]
    fn training_state_record_val_accuracy() {
        let mut state = TrainingState::new();
        assert!(state.record_val_accuracy(0.3));
        assert!(state.record_val_accuracy(0.5));
        assert!(!state.record_val_accuracy(0.5));
        assert!(!state.record_val_accuracy(0.4));
        assert_eq!(state.best_val_accuracy, Some(0.5));
    }

    #[test]
    fn trainer_num_batches() {
        let trainer = Trainer::new(TrainingConfig::new(10).with_batch_size(32));
        assert_eq!(trainer.num_batches(100), 4);
        assert_eq!(trainer.num_batches(32), 1);
        assert_eq!(trainer.num_batches(33), 2);
        assert_eq!(trainer.num_batches(0), 0);
    }

    #[test]
    fn trainer_batch_indices() {
        let trainer = Trainer::new(TrainingConfig::new(10).with_batch_size(32));
        assert_eq!(trainer.batch_indices(0, 100), (0, 32));
        assert_eq!(trainer.batch_indices(3, 100), (96, 100));
    }

    #[test]
    fn trainer_split_holds_out_tail() {
        let data = tiny_data();
        let trainer = Trainer::new(TrainingConfig::default());
        let (train, val) = trainer.split(&data).unwrap();
        assert_eq!(train.len(), 36);
        assert_eq!(val.len(), 4);
        assert_eq!(val.class_of(0), data.class_of(36));

        let no_val = Trainer::new(TrainingConfig::default().with_validation_split(0.0));
        let (train, val) = no_val.split(&data).unwrap();
        assert_eq!(train.len(), 40);
        assert!(val.is_empty());
    }

    #[test]
    fn fit_records_every_epoch() {
        let device = <TrainBackend as Backend>::Device::default();
        let config = TrainingConfig::new(2)
            .with_batch_size(8)
            .with_learning_rate(0.01)
            .with_seed(3);

        let fitted = Trainer::new(config)
            .fit(tiny_model(), &tiny_data(), &device)
            .unwrap();

        let metrics = &fitted.metrics;
        assert_eq!(metrics.epochs_completed(), 2);
        for epoch in &metrics.epoch_metrics {
            assert!(epoch.train_loss.is_finite());
            assert!((0.0..=1.0).contains(&epoch.train_accuracy));
            let val = epoch.val_accuracy.unwrap();
            assert!((0.0..=1.0).contains(&val));
            assert_eq!(epoch.val_samples, Some(4));
        }
        assert!(metrics.best_val_accuracy.is_some());
    }

    #[test]
    fn fit_with_each_optimizer() {
        let device = <TrainBackend as Backend>::Device::default();
        for optimizer in [
            crate::OptimizerConfig::sgd(0.01),
            crate::OptimizerConfig::sgd_momentum(0.01, 0.9),
            crate::OptimizerConfig::adamw(1e-3, 1e-4),
        ] {
            let config = TrainingConfig::new(1)
                .with_batch_size(16)
                .with_optimizer(optimizer)
                .with_seed(1);
            let fitted = Trainer::new(config)
                .fit(tiny_model(), &tiny_data(), &device)
                .unwrap();
            assert_eq!(fitted.metrics.epochs_completed(), 1);
        }
    }

    #[test]
    fn fit_rejects_invalid_config() {
        let device = <TrainBackend as Backend>::Device::default();
        let trainer = Trainer::new(TrainingConfig::new(1).with_batch_size(0));
        let result = trainer.fit(tiny_model(), &tiny_data(), &device);
        assert!(matches!(result, Err(TrainingError::InvalidConfig(_))));
    }

    #[test]
    fn evaluate_reports_unit_accuracy() {
        let device = <InferBackend as Backend>::Device::default();
        let config = ConvNetConfig::cifar10(4, 4, 8).with_input(3, 8, 8);
        let model = ConvNet::<InferBackend>::new(config, &device).unwrap();

        let data = tiny_data();
        let eval = evaluate::<InferBackend, _>(&model, &data, 7, &device).unwrap();
        assert_eq!(eval.samples, 40);
        assert!(eval.loss.is_finite() && eval.loss > 0.0);
        assert!((0.0..=1.0).contains(&eval.accuracy));
    }

    #[test]
    fn evaluate_rejects_empty_partition() {
        let device = <InferBackend as Backend>::Device::default();
        let config = ConvNetConfig::cifar10(4, 4, 8).with_input(3, 8, 8);
        let model = ConvNet::<InferBackend>::new(config, &device).unwrap();

        let empty = LabeledImages::empty(ImageShape::new(3, 8, 8), 10);
        let result = evaluate::<InferBackend, _>(&model, &empty, 8, &device);
        assert!(matches!(result, Err(TrainingError::Dataset(_))));
    }
}
