//! The tuning experiment: data, objective, search and outputs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use burn::backend::Autodiff;
use burn::module::AutodiffModule;
use burn::prelude::Backend;
use burn_ndarray::NdArray;
use ml_dataset::{
    Dataset, DatasetError, DatasetSummary, ImageShape, LabeledImages, validate_images,
};
use ml_models::{ConvNet, ConvNetConfig, load_checkpoint, save_checkpoint};
use ml_search::{Assignment, TrialOutcome, Trials, minimize};
use ml_training::{Evaluation, Trainer, TrainingError, evaluate};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{DataSource, HyperParams, TuneConfig};
use crate::error::{Result, TuneError};

/// Backend used for inference and the saved checkpoint.
pub type EvalBackend = NdArray<f32>;

/// Backend used for training.
pub type TrainBackend = Autodiff<EvalBackend>;

/// Device shared by both backends.
pub type Device = <EvalBackend as Backend>::Device;

/// File name of the trial history in the output directory.
pub const TRIALS_FILE: &str = "trials.json";

/// File name of the best-run record in the output directory.
pub const BEST_RUN_FILE: &str = "best_run.json";

/// Checkpoint stem in the output directory (extension added by format).
pub const CHECKPOINT_STEM: &str = "best_model";

/// Summary of the winning trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestRun {
    /// Id of the winning trial.
    pub trial_id: usize,

    /// Its hyperparameters.
    pub params: HyperParams,

    /// The network it trained; rebuilds the model before loading the
    /// checkpoint.
    pub model: ConvNetConfig,

    /// The raw assignment.
    pub assignment: Assignment,

    /// Its loss (negated best validation accuracy).
    pub loss: f64,

    /// Side metrics recorded for the trial.
    pub metrics: BTreeMap<String, f64>,

    /// Test-set evaluation of the trained model, when it is available.
    pub test: Option<Evaluation>,

    /// Path of the saved checkpoint.
    pub checkpoint: Option<PathBuf>,

    /// Trials in the history.
    pub total_trials: usize,

    /// Successful trials in the history.
    pub completed_trials: usize,
}

/// Everything a finished run produces.
#[derive(Debug)]
pub struct TuneReport {
    /// The winning trial.
    pub best: BestRun,

    /// Full trial history.
    pub trials: Trials,

    /// The winning model, in inference form.
    ///
    /// `None` only when a resumed run's best trial came from the loaded
    /// history, whose models are not kept.
    pub model: Option<ConvNet<EvalBackend>>,
}

/// Loads and validates both partitions.
///
/// # Errors
///
/// Returns an error if loading fails, a partition is empty, a label is not
/// one-hot or a pixel lies outside `[0, 1]`.
pub fn load_data(source: &DataSource) -> Result<Dataset> {
    let dataset = match source {
        DataSource::Cifar10(loader) => loader.load()?,
        DataSource::Synthetic(generator) => generator.generate()?,
    };

    for (partition, images) in [("train", &dataset.train), ("test", &dataset.test)] {
        if images.is_empty() {
            return Err(DatasetError::EmptyDataset.into());
        }
        validate_images(images)?;
        let summary = DatasetSummary::from_images(images);
        info!(
            partition,
            samples = summary.total_samples,
            mean_pixel = summary.mean_pixel,
            "Loaded partition"
        );
    }
    Ok(dataset)
}

/// Network configuration for a trial.
#[must_use]
pub const fn model_config(
    params: &HyperParams,
    shape: ImageShape,
    num_classes: usize,
    dropout: f64,
) -> ConvNetConfig {
    ConvNetConfig::cifar10(params.conv1_filters, params.conv2_filters, params.dense_units)
        .with_input(shape.channels, shape.height, shape.width)
        .with_num_classes(num_classes)
        .with_dropout(dropout)
}

/// Trains one network and scores it.
///
/// The loss is the negated best per-epoch validation accuracy, so it lies
/// in `[-1, 0]`. A diverging run is reported as a failed trial; any other
/// error aborts the search.
///
/// # Errors
///
/// Returns an error if the model cannot be built, training fails for a
/// reason other than a non-finite loss, or no validation ran.
#[allow(clippy::cast_precision_loss)]
pub fn train_trial(
    params: &HyperParams,
    train: &LabeledImages,
    config: &TuneConfig,
    device: &Device,
) -> Result<TrialOutcome<ConvNet<TrainBackend>>> {
    let net = model_config(params, train.shape(), train.num_classes(), config.dropout);
    let model = ConvNet::<TrainBackend>::new(net, device)?;

    let trainer = Trainer::new(config.trial_training(params));
    let fitted = match trainer.fit(model, train, device) {
        Ok(fitted) => fitted,
        Err(TrainingError::NumericalInstability(reason)) => {
            warn!(?params, %reason, "Training diverged");
            return Ok(TrialOutcome::failed(reason));
        }
        Err(err) => return Err(err.into()),
    };

    let metrics = &fitted.metrics;
    let (Some(val_accuracy), Some(best_epoch)) = (metrics.best_val_accuracy, metrics.best_epoch)
    else {
        return Err(TuneError::invalid_config(
            "no validation accuracy recorded; validation_split must be > 0",
        ));
    };
    let val_loss = metrics
        .epoch_metrics
        .iter()
        .find(|m| m.epoch == best_epoch)
        .and_then(|m| m.val_loss)
        .unwrap_or(f32::NAN);

    Ok(TrialOutcome::ok(-f64::from(val_accuracy))
        .with_metric("val_accuracy", f64::from(val_accuracy))
        .with_metric("val_loss", f64::from(val_loss))
        .with_metric("train_accuracy", f64::from(metrics.final_train_accuracy()))
        .with_metric("train_loss", f64::from(metrics.final_loss()))
        .with_metric("best_epoch", best_epoch as f64)
        .with_artifact(fitted.model))
}

/// Runs the whole experiment.
///
/// The trial history is written to the output directory even when the
/// search aborts.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, data loading fails,
/// a trial aborts or no trial succeeds.
pub fn run(config: &TuneConfig) -> Result<TuneReport> {
    config.validate()?;
    let device = Device::default();

    let dataset = load_data(&config.data)?;
    let space = config.choices.search_space()?;
    let mut trials = initial_trials(config)?;

    info!(
        max_evals = config.search.max_evals,
        algorithm = config.search.algorithm.name(),
        epochs = config.training.epochs,
        train = dataset.train.len(),
        test = dataset.test.len(),
        "Starting search"
    );

    let train = &dataset.train;
    let searched = minimize(
        &space,
        |assignment| {
            let params = HyperParams::from_assignment(assignment)?;
            info!(%assignment, "Training trial");
            train_trial(&params, train, config, &device)
        },
        &config.search,
        &mut trials,
    );

    if let Some(dir) = &config.output_dir {
        fs::create_dir_all(dir)?;
        trials.save_json(&dir.join(TRIALS_FILE))?;
    }
    let outcome = searched?;

    let model = outcome.artifact.map(|m| m.valid());
    let test = model
        .as_ref()
        .map(|m| evaluate::<EvalBackend, _>(m, &dataset.test, config.eval_batch_size, &device))
        .transpose()?;
    if let Some(eval) = &test {
        info!(loss = eval.loss, accuracy = eval.accuracy, "Test evaluation");
    }

    let checkpoint = match (&config.output_dir, &model) {
        (Some(dir), Some(model)) => Some(save_checkpoint::<EvalBackend, _>(
            model.clone(),
            &dir.join(CHECKPOINT_STEM),
            config.checkpoint_format,
        )?),
        _ => None,
    };

    let params = HyperParams::from_assignment(&outcome.best.assignment)?;
    let best = BestRun {
        trial_id: outcome.best.id,
        params,
        model: model_config(
            &params,
            dataset.train.shape(),
            dataset.train.num_classes(),
            config.dropout,
        ),
        assignment: outcome.best.assignment.clone(),
        loss: outcome.best.loss.unwrap_or(f64::NAN),
        metrics: outcome.best.metrics.clone(),
        test,
        checkpoint,
        total_trials: trials.len(),
        completed_trials: trials.completed_count(),
    };

    if let Some(dir) = &config.output_dir {
        write_json(&dir.join(BEST_RUN_FILE), &best)?;
    }

    Ok(TuneReport {
        best,
        trials,
        model,
    })
}

/// Reloads the winner of a finished run from its output directory.
///
/// Reads `best_run.json`, rebuilds the recorded network and loads the
/// checkpoint into it.
///
/// # Errors
///
/// Returns an error if `best_run.json` is missing or records no checkpoint,
/// or the checkpoint does not match the recorded network.
pub fn load_best_model(dir: &Path, device: &Device) -> Result<(BestRun, ConvNet<EvalBackend>)> {
    let text = fs::read_to_string(dir.join(BEST_RUN_FILE))?;
    let best: BestRun = serde_json::from_str(&text)?;
    let Some(path) = &best.checkpoint else {
        return Err(TuneError::invalid_config(format!(
            "{} records no checkpoint",
            dir.join(BEST_RUN_FILE).display()
        )));
    };

    let fresh = ConvNet::<EvalBackend>::new(best.model, device)?;
    let model = load_checkpoint::<EvalBackend, _>(fresh, path, device)?;
    info!(path = %path.display(), trial = best.trial_id, "Loaded best model");
    Ok((best, model))
}

fn initial_trials(config: &TuneConfig) -> Result<Trials> {
    let path = match (&config.output_dir, config.resume) {
        (Some(dir), true) => dir.join(TRIALS_FILE),
        _ => return Ok(Trials::new()),
    };
    if !path.exists() {
        info!(path = %path.display(), "No trial history to resume; starting fresh");
        return Ok(Trials::new());
    }
    let trials = Trials::load_json(&path)?;
    info!(path = %path.display(), trials = trials.len(), "Loaded trial history");
    Ok(trials)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_dataset::SyntheticDataset;

    fn tiny() -> SyntheticDataset {
        SyntheticDataset::new(40, 20)
            .with_shape(ImageShape::new(3, 8, 8))
            .with_seed(3)
    }

    fn params() -> HyperParams {
        HyperParams {
            conv1_filters: 4,
            conv2_filters: 4,
            dense_units: 8,
            learning_rate: 0.01,
            batch_size: 16,
        }
    }

    #[test]
    fn load_data_validates_partitions() {
        let dataset = load_data(&DataSource::Synthetic(tiny())).unwrap();
        assert_eq!(dataset.train.len(), 40);
        assert_eq!(dataset.test.len(), 20);
    }

    #[test]
    fn load_data_rejects_empty_partition() {
        let source = DataSource::Synthetic(SyntheticDataset::new(10, 0).with_seed(1));
        assert!(matches!(
            load_data(&source),
            Err(TuneError::Dataset(DatasetError::EmptyDataset))
        ));
    }

    #[test]
    fn load_data_reports_missing_cifar_directory() {
        let source = DataSource::Cifar10(ml_dataset::Cifar10Loader::new("/definitely/missing"));
        assert!(matches!(load_data(&source), Err(TuneError::Dataset(_))));
    }

    #[test]
    fn model_config_follows_params() {
        let config = model_config(&params(), ImageShape::new(3, 8, 8), 10, 0.5);
        assert_eq!(config.conv1_filters, 4);
        assert_eq!(config.dense_units, 8);
        assert_eq!(config.input_height, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn trial_loss_is_negated_accuracy() {
        let mut config = TuneConfig::default().with_synthetic(tiny());
        config.training.epochs = 2;
        config.training.seed = Some(4);
        let dataset = load_data(&config.data).unwrap();

        let outcome = train_trial(&params(), &dataset.train, &config, &Device::default()).unwrap();
        assert!(outcome.loss.is_finite());
        assert!((-1.0..=0.0).contains(&outcome.loss));
        assert!((outcome.metrics["val_accuracy"] + outcome.loss).abs() < 1e-12);
        for key in ["val_loss", "train_accuracy", "train_loss"] {
            assert!(outcome.metrics.contains_key(key), "missing {key}");
        }
        assert!(outcome.artifact.is_some());
    }
}
