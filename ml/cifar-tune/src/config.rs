//! Experiment configuration.

use std::path::{Path, PathBuf};

use ml_dataset::{Cifar10Loader, SyntheticDataset};
use ml_models::CheckpointFormat;
use ml_search::{Assignment, ParameterDomain, SearchConfig, SearchSpace};
use ml_training::TrainingConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TuneError};

/// Parameter names used in the search space and in `trials.json`.
pub mod names {
    /// Filters in the first convolution block.
    pub const CONV1_FILTERS: &str = "conv1_filters";
    /// Filters in the second convolution block.
    pub const CONV2_FILTERS: &str = "conv2_filters";
    /// Units in the dense block.
    pub const DENSE_UNITS: &str = "dense_units";
    /// Optimizer learning rate.
    pub const LEARNING_RATE: &str = "learning_rate";
    /// Mini-batch size.
    pub const BATCH_SIZE: &str = "batch_size";
}

/// Where images come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DataSource {
    /// The CIFAR-10 binary distribution on disk.
    Cifar10(Cifar10Loader),
    /// Generated class-dependent images.
    Synthetic(SyntheticDataset),
}

impl Default for DataSource {
    fn default() -> Self {
        Self::Cifar10(Cifar10Loader::new("data/cifar-10-batches-bin"))
    }
}

/// Candidate values for each tunable hyperparameter.
///
/// # Example
///
/// ```
/// use cifar_tune::ChoiceSets;
///
/// let space = ChoiceSets::default().search_space().unwrap();
/// assert_eq!(space.len(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoiceSets {
    /// Options for the first block's filter count.
    pub conv1_filters: Vec<usize>,
    /// Options for the second block's filter count.
    pub conv2_filters: Vec<usize>,
    /// Options for the dense width.
    pub dense_units: Vec<usize>,
    /// Options for the learning rate.
    pub learning_rate: Vec<f64>,
    /// Options for the batch size.
    pub batch_size: Vec<usize>,
}

impl Default for ChoiceSets {
    fn default() -> Self {
        Self {
            conv1_filters: vec![32, 64],
            conv2_filters: vec![32, 64],
            dense_units: vec![128, 256, 512],
            learning_rate: vec![0.001, 0.01],
            batch_size: vec![16, 32, 64],
        }
    }
}

impl ChoiceSets {
    /// Builds the search space, one choice domain per hyperparameter.
    ///
    /// # Errors
    ///
    /// Returns an error if a list is empty or holds a value that cannot be
    /// used (zero width, non-positive learning rate).
    pub fn search_space(&self) -> Result<SearchSpace> {
        let mut space = SearchSpace::new();
        for (name, options) in [
            (names::CONV1_FILTERS, &self.conv1_filters),
            (names::CONV2_FILTERS, &self.conv2_filters),
            (names::DENSE_UNITS, &self.dense_units),
            (names::BATCH_SIZE, &self.batch_size),
        ] {
            if options.contains(&0) {
                return Err(TuneError::invalid_config(format!("{name} options must be > 0")));
            }
            let values = options
                .iter()
                .map(|&v| i64::try_from(v))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| TuneError::invalid_config(format!("{name} option too large")))?;
            space.add(name, ParameterDomain::choice(values))?;
        }

        if self
            .learning_rate
            .iter()
            .any(|lr| !(lr.is_finite() && *lr > 0.0))
        {
            return Err(TuneError::invalid_config(
                "learning_rate options must be positive",
            ));
        }
        space.add(
            names::LEARNING_RATE,
            ParameterDomain::choice(self.learning_rate.iter().copied()),
        )?;
        Ok(space)
    }
}

/// The hyperparameters of one trial, read back from an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperParams {
    /// Filters in the first convolution block.
    pub conv1_filters: usize,
    /// Filters in the second convolution block.
    pub conv2_filters: usize,
    /// Units in the dense block.
    pub dense_units: usize,
    /// Optimizer learning rate.
    pub learning_rate: f64,
    /// Mini-batch size.
    pub batch_size: usize,
}

impl HyperParams {
    /// Reads every hyperparameter from `assignment`.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is missing or has the wrong type.
    pub fn from_assignment(assignment: &Assignment) -> Result<Self> {
        Ok(Self {
            conv1_filters: assignment.get_usize(names::CONV1_FILTERS)?,
            conv2_filters: assignment.get_usize(names::CONV2_FILTERS)?,
            dense_units: assignment.get_usize(names::DENSE_UNITS)?,
            learning_rate: assignment.get_f64(names::LEARNING_RATE)?,
            batch_size: assignment.get_usize(names::BATCH_SIZE)?,
        })
    }
}

/// Full configuration of a tuning run.
///
/// Defaults reproduce the reference experiment: ten TPE trials of ten
/// epochs each, Adam, a 10% validation tail, on CIFAR-10.
///
/// # Example
///
/// ```
/// use cifar_tune::TuneConfig;
///
/// let config = TuneConfig::default();
/// assert_eq!(config.search.max_evals, 10);
/// assert_eq!(config.training.epochs, 10);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuneConfig {
    /// Image source.
    pub data: DataSource,

    /// Candidate hyperparameter values.
    pub choices: ChoiceSets,

    /// Per-trial training settings; batch size and learning rate are
    /// overridden by each assignment.
    pub training: TrainingConfig,

    /// Search budget and algorithm.
    pub search: SearchConfig,

    /// Dropout after the dense block.
    pub dropout: f64,

    /// Batch size for the final test-set evaluation.
    pub eval_batch_size: usize,

    /// Directory for `trials.json`, `best_run.json` and the checkpoint.
    pub output_dir: Option<PathBuf>,

    /// Continue from `trials.json` in `output_dir` if it exists.
    pub resume: bool,

    /// Format of the best-model checkpoint.
    pub checkpoint_format: CheckpointFormat,
}

impl Default for TuneConfig {
    fn default() -> Self {
        Self {
            data: DataSource::default(),
            choices: ChoiceSets::default(),
            training: TrainingConfig::default(),
            search: SearchConfig::default(),
            dropout: 0.5,
            eval_batch_size: 256,
            output_dir: None,
            resume: false,
            checkpoint_format: CheckpointFormat::Binary,
        }
    }
}

impl TuneConfig {
    /// Reads a configuration from a JSON file; absent fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Uses generated data instead of the configured source.
    #[must_use]
    pub fn with_synthetic(mut self, synthetic: SyntheticDataset) -> Self {
        self.data = DataSource::Synthetic(synthetic);
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Training settings for one trial.
    ///
    /// A search seed is passed on to training when none is set, so seeded
    /// searches have a deterministic objective.
    #[must_use]
    pub fn trial_training(&self, params: &HyperParams) -> TrainingConfig {
        let mut training = self
            .training
            .clone()
            .with_batch_size(params.batch_size)
            .with_learning_rate(params.learning_rate);
        if training.seed.is_none() {
            training.seed = self.search.seed;
        }
        training
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TuneError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        self.choices.search_space()?;
        if self.search.max_evals == 0 {
            return Err(TuneError::invalid_config("max_evals must be > 0"));
        }
        if let ml_search::Algorithm::Tpe(tpe) = &self.search.algorithm {
            tpe.validate()?;
        }
        if self.training.validation_split <= 0.0 {
            return Err(TuneError::invalid_config(
                "validation_split must be > 0: trials are scored on validation accuracy",
            ));
        }
        self.training
            .validate()
            .map_err(|e| TuneError::invalid_config(e.to_string()))?;
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(TuneError::invalid_config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.eval_batch_size == 0 {
            return Err(TuneError::invalid_config("eval_batch_size must be > 0"));
        }
        if self.resume && self.output_dir.is_none() {
            return Err(TuneError::invalid_config("resume requires an output_dir"));
        }
        Ok(())
    }
}
