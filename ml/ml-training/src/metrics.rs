//! Per-epoch and per-run training metrics.

use serde::{Deserialize, Serialize};

/// Metrics for a single training epoch.
///
/// # Example
///
/// ```
/// use ml_training::EpochMetrics;
///
/// let metrics = EpochMetrics::new(0, 1.9, 0.31).with_validation(1.7, 0.38);
/// assert_eq!(metrics.epoch, 0);
/// assert_eq!(metrics.val_accuracy, Some(0.38));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Epoch number (0-indexed).
    pub epoch: usize,

    /// Mean cross-entropy over the training batches.
    pub train_loss: f32,

    /// Fraction of training samples classified correctly.
    pub train_accuracy: f32,

    /// Validation cross-entropy (if a validation partition exists).
    pub val_loss: Option<f32>,

    /// Validation accuracy (if a validation partition exists).
    pub val_accuracy: Option<f32>,

    /// Learning rate used.
    pub learning_rate: f64,

    /// Training time in seconds.
    pub train_time_secs: f32,

    /// Validation time in seconds.
    pub val_time_secs: Option<f32>,

    /// Number of training samples processed.
    pub train_samples: usize,

    /// Number of validation samples processed.
    pub val_samples: Option<usize>,
}

impl EpochMetrics {
    /// Creates new epoch metrics with training statistics only.
    #[must_use]
    pub const fn new(epoch: usize, train_loss: f32, train_accuracy: f32) -> Self {
        Self {
            epoch,
            train_loss,
            train_accuracy,
            val_loss: None,
            val_accuracy: None,
            learning_rate: 0.0,
            train_time_secs: 0.0,
            val_time_secs: None,
            train_samples: 0,
            val_samples: None,
        }
    }

    /// Sets validation loss and accuracy.
    #[must_use]
    pub const fn with_validation(mut self, loss: f32, accuracy: f32) -> Self {
        self.val_loss = Some(loss);
        self.val_accuracy = Some(accuracy);
        self
    }

    /// Sets the learning rate.
    #[must_use]
    pub const fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Sets the training time.
    #[must_use]
    pub const fn with_train_time(mut self, secs: f32) -> Self {
        self.train_time_secs = secs;
        self
    }

    /// Sets the validation time.
    #[must_use]
    pub const fn with_val_time(mut self, secs: f32) -> Self {
        self.val_time_secs = Some(secs);
        self
    }

    /// Sets sample counts.
    #[must_use]
    pub const fn with_samples(mut self, train: usize, val: Option<usize>) -> Self {
        self.train_samples = train;
        self.val_samples = val;
        self
    }

    /// Returns total time (train + val) in seconds.
    #[must_use]
    pub fn total_time_secs(&self) -> f32 {
        self.train_time_secs + self.val_time_secs.unwrap_or(0.0)
    }
}

/// Aggregate metrics for a training run.
///
/// # Example
///
/// ```
/// use ml_training::{EpochMetrics, TrainingMetrics};
///
/// let mut metrics = TrainingMetrics::new();
/// metrics.add_epoch(EpochMetrics::new(0, 2.0, 0.2).with_validation(1.9, 0.25));
/// metrics.add_epoch(EpochMetrics::new(1, 1.6, 0.4).with_validation(1.7, 0.35));
/// metrics.add_epoch(EpochMetrics::new(2, 1.4, 0.5).with_validation(1.8, 0.30));
///
/// assert_eq!(metrics.best_val_accuracy, Some(0.35));
/// assert_eq!(metrics.best_epoch, Some(1));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Metrics for each epoch.
    pub epoch_metrics: Vec<EpochMetrics>,

    /// Highest validation accuracy seen.
    pub best_val_accuracy: Option<f32>,

    /// Epoch with the highest validation accuracy (first one on ties).
    pub best_epoch: Option<usize>,

    /// Lowest validation loss seen.
    pub best_val_loss: Option<f32>,

    /// Total training time in seconds.
    pub total_time_secs: f32,
}

impl TrainingMetrics {
    /// Creates new empty training metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds metrics for an epoch.
    pub fn add_epoch(&mut self, metrics: EpochMetrics) {
        if let Some(accuracy) = metrics.val_accuracy {
            if self.best_val_accuracy.is_none_or(|best| accuracy > best) {
                self.best_val_accuracy = Some(accuracy);
                self.best_epoch = Some(metrics.epoch);
            }
        }
        if let Some(loss) = metrics.val_loss {
            if self.best_val_loss.is_none_or(|best| loss < best) {
                self.best_val_loss = Some(loss);
            }
        }

        self.total_time_secs += metrics.total_time_secs();
        self.epoch_metrics.push(metrics);
    }

    /// Returns the number of completed epochs.
    #[must_use]
    pub fn epochs_completed(&self) -> usize {
        self.epoch_metrics.len()
    }

    /// Returns the last epoch's metrics.
    #[must_use]
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epoch_metrics.last()
    }

    /// Returns the final training loss.
    #[must_use]
    pub fn final_loss(&self) -> f32 {
        self.last().map_or(f32::NAN, |m| m.train_loss)
    }

    /// Returns the final training accuracy.
    #[must_use]
    pub fn final_train_accuracy(&self) -> f32 {
        self.last().map_or(f32::NAN, |m| m.train_accuracy)
    }

    /// Returns the final validation loss.
    #[must_use]
    pub fn final_val_loss(&self) -> Option<f32> {
        self.last().and_then(|m| m.val_loss)
    }

    /// Returns the final validation accuracy.
    #[must_use]
    pub fn final_val_accuracy(&self) -> Option<f32> {
        self.last().and_then(|m| m.val_accuracy)
    }

    /// Returns training losses as a vector.
    #[must_use]
    pub fn train_losses(&self) -> Vec<f32> {
        self.epoch_metrics.iter().map(|m| m.train_loss).collect()
    }

    /// Returns validation accuracies as a vector.
    #[must_use]
    pub fn val_accuracies(&self) -> Vec<Option<f32>> {
        self.epoch_metrics.iter().map(|m| m.val_accuracy).collect()
    }

    /// Returns a human-readable summary.
    #[must_use]
    #[allow(clippy::let_underscore_must_use)] // String::write_fmt is infallible
    pub fn summary(&self) -> String {
        use std::fmt::Write;

        let mut s = String::new();
        let _ = writeln!(s, "Training Summary");
        let _ = writeln!(s, "================");
        let _ = writeln!(s, "Epochs completed: {}", self.epochs_completed());
        let _ = writeln!(s, "Total time: {:.1}s", self.total_time_secs);
        let _ = writeln!(
            s,
            "Final train loss: {:.4} (accuracy {:.4})",
            self.final_loss(),
            self.final_train_accuracy()
        );

        if let Some(best) = self.best_val_accuracy {
            let _ = writeln!(
                s,
                "Best val accuracy: {:.4} (epoch {})",
                best,
                self.best_epoch.unwrap_or(0)
            );
        }
        if let Some(best) = self.best_val_loss {
            let _ = writeln!(s, "Best val loss: {best:.4}");
        }

        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_metrics_new() {
        let metrics = EpochMetrics::new(0, 0.5, 0.8);
        assert_eq!(metrics.epoch, 0);
        assert!((metrics.train_loss - 0.5).abs() < 1e-6);
        assert!((metrics.train_accuracy - 0.8).abs() < 1e-6);
        assert!(metrics.val_loss.is_none());
        assert!(metrics.val_accuracy.is_none());
    }

    #[test]
    fn epoch_metrics_builder() {
        let metrics = EpochMetrics::new(1, 0.3, 0.9)
            .with_validation(0.4, 0.85)
            .with_learning_rate(1e-3)
            .with_train_time(10.0)
            .with_val_time(2.0)
            .with_samples(1000, Some(200));

        assert!((metrics.learning_rate - 1e-3).abs() < 1e-12);
        assert!((metrics.val_accuracy.unwrap() - 0.85).abs() < 1e-6);
        assert_eq!(metrics.train_samples, 1000);
        assert_eq!(metrics.val_samples, Some(200));
        assert!((metrics.total_time_secs() - 12.0).abs() < 1e-6);
    }

    #[test]
    fn training_metrics_tracks_best_accuracy() {
        let mut metrics = TrainingMetrics::new();
        metrics.add_epoch(EpochMetrics::new(0, 2.0, 0.2).with_validation(1.9, 0.3));
        metrics.add_epoch(EpochMetrics::new(1, 1.5, 0.4).with_validation(1.6, 0.5));
        metrics.add_epoch(EpochMetrics::new(2, 1.2, 0.6).with_validation(1.5, 0.5));
        metrics.add_epoch(EpochMetrics::new(3, 1.0, 0.7).with_validation(1.7, 0.45));

        assert_eq!(metrics.epochs_completed(), 4);
        assert_eq!(metrics.best_val_accuracy, Some(0.5));
        assert_eq!(metrics.best_epoch, Some(1));
        assert_eq!(metrics.best_val_loss, Some(1.5));
        assert_eq!(metrics.final_val_accuracy(), Some(0.45));
    }

    #[test]
    fn training_metrics_without_validation() {
        let mut metrics = TrainingMetrics::new();
        metrics.add_epoch(EpochMetrics::new(0, 1.0, 0.5).with_train_time(3.0));

        assert!(metrics.best_val_accuracy.is_none());
        assert!(metrics.best_epoch.is_none());
        assert!((metrics.total_time_secs - 3.0).abs() < 1e-6);
        assert_eq!(metrics.val_accuracies(), vec![None]);
    }

    #[test]
    fn training_metrics_empty() {
        let metrics = TrainingMetrics::new();
        assert_eq!(metrics.epochs_completed(), 0);
        assert!(metrics.final_loss().is_nan());
        assert!(metrics.final_val_loss().is_none());
    }

    #[test]
    fn training_metrics_summary() {
        let mut metrics = TrainingMetrics::new();
        metrics.add_epoch(EpochMetrics::new(0, 1.0, 0.4).with_validation(0.9, 0.45));
        metrics.add_epoch(EpochMetrics::new(1, 0.5, 0.7).with_validation(0.6, 0.65));

        let summary = metrics.summary();
        assert!(summary.contains("Epochs completed: 2"));
        assert!(summary.contains("Best val accuracy: 0.6500 (epoch 1)"));
        assert!(summary.contains("Best val loss:"));
    }

    #[test]
    fn training_metrics_serialization() {
        let mut metrics = TrainingMetrics::new();
        metrics.add_epoch(EpochMetrics::new(0, 0.5, 0.7).with_validation(0.4, 0.75));

        let json = serde_json::to_string(&metrics).unwrap();
        let parsed: TrainingMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, metrics);
    }
}
