//! CIFAR-10 hyperparameter search.
//!
//! # Usage
//!
//! ```bash
//! # 10 TPE trials on the binary distribution in data/cifar-10-batches-bin
//! cifar-tune --output runs/cifar
//!
//! # Quick run on generated images
//! cifar-tune --synthetic --train-limit 500 --test-limit 100 --epochs 2
//!
//! # Continue a previous run for 20 more trials
//! cifar-tune --output runs/cifar --resume --max-evals 20
//! ```
//!
//! Logging goes to stderr and follows `RUST_LOG` (default `info`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use cifar_tune::{DataSource, TuneConfig, TuneReport, run};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use ml_dataset::SyntheticDataset;
use ml_models::CheckpointFormat;
use ml_search::{Algorithm, TpeConfig};
use tracing_subscriber::EnvFilter;

/// Generated-image counts used by `--synthetic` without limits.
const SYNTHETIC_TRAIN: usize = 500;
const SYNTHETIC_TEST: usize = 100;

/// CIFAR-10 hyperparameter search
///
/// Trains a small convolutional network per trial and keeps the one with
/// the best validation accuracy.
#[derive(Debug, Parser)]
#[command(name = "cifar-tune")]
#[command(about = "Hyperparameter search for a CIFAR-10 ConvNet", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON experiment configuration; flags override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the CIFAR-10 binary batches
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Use generated images instead of CIFAR-10
    #[arg(long, conflicts_with = "data_dir")]
    synthetic: bool,

    /// Maximum training images (sample count with --synthetic)
    #[arg(long)]
    train_limit: Option<usize>,

    /// Maximum test images (sample count with --synthetic)
    #[arg(long)]
    test_limit: Option<usize>,

    /// Number of trials to run
    #[arg(long)]
    max_evals: Option<usize>,

    /// Epochs per trial
    #[arg(long)]
    epochs: Option<usize>,

    /// Seed for the search and for training
    #[arg(long)]
    seed: Option<u64>,

    /// Search algorithm
    #[arg(long, value_enum)]
    algorithm: Option<AlgorithmArg>,

    /// Directory for trials.json, best_run.json and the checkpoint
    #[arg(long)]
    output: Option<PathBuf>,

    /// Continue from trials.json in the output directory
    #[arg(long, requires = "output")]
    resume: bool,

    /// Checkpoint format for the best model
    #[arg(long, value_enum)]
    checkpoint_format: Option<FormatArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AlgorithmArg {
    Tpe,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Bin,
    Json,
}

impl From<FormatArg> for CheckpointFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Bin => Self::Binary,
            FormatArg::Json => Self::Json,
        }
    }
}

impl Cli {
    fn into_config(self) -> Result<TuneConfig> {
        let mut config = match &self.config {
            Some(path) => TuneConfig::from_json_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => TuneConfig::default(),
        };

        if self.synthetic {
            let seed = self.seed.unwrap_or_default();
            config.data = DataSource::Synthetic(
                SyntheticDataset::new(
                    self.train_limit.unwrap_or(SYNTHETIC_TRAIN),
                    self.test_limit.unwrap_or(SYNTHETIC_TEST),
                )
                .with_seed(seed),
            );
        } else if let DataSource::Cifar10(loader) = &mut config.data {
            if let Some(dir) = self.data_dir {
                loader.root = dir;
            }
            if self.train_limit.is_some() {
                loader.train_limit = self.train_limit;
            }
            if self.test_limit.is_some() {
                loader.test_limit = self.test_limit;
            }
        }

        if let Some(max_evals) = self.max_evals {
            config.search.max_evals = max_evals;
        }
        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(seed) = self.seed {
            config.search.seed = Some(seed);
        }
        match self.algorithm {
            Some(AlgorithmArg::Random) => config.search.algorithm = Algorithm::Random,
            Some(AlgorithmArg::Tpe) if !matches!(config.search.algorithm, Algorithm::Tpe(_)) => {
                config.search.algorithm = Algorithm::Tpe(TpeConfig::default());
            }
            _ => {}
        }
        if self.output.is_some() {
            config.output_dir = self.output;
        }
        config.resume |= self.resume;
        if let Some(format) = self.checkpoint_format {
            config.checkpoint_format = format.into();
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Cli::parse().into_config()?;
    let report = run(&config).context("hyperparameter search failed")?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &TuneReport) {
    let best = &report.best;
    println!();
    println!("{}", "Best trial".bold());
    println!("{}", "==========".bold());
    println!(
        "  trial {} of {} ({} succeeded)",
        best.trial_id, best.total_trials, best.completed_trials
    );
    println!("  {}", best.assignment);
    println!(
        "  validation accuracy: {}",
        format!("{:.4}", -best.loss).green().bold()
    );
    match &best.test {
        Some(test) => println!(
            "  test accuracy:       {} (loss {:.4})",
            format!("{:.4}", test.accuracy).green().bold(),
            test.loss
        ),
        None => println!(
            "  {}",
            "test accuracy:       n/a (best trial came from resumed history)".yellow()
        ),
    }
    if let Some(path) = &best.checkpoint {
        println!("  checkpoint: {}", path.display().to_string().dimmed());
    }
    println!();
}
