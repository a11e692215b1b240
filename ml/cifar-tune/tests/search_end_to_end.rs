//! End-to-end search runs on tiny generated images.

use std::sync::{Mutex, MutexGuard, PoisonError};

use cifar_tune::{
    BEST_RUN_FILE, BestRun, ChoiceSets, Device, EvalBackend, HyperParams, TRIALS_FILE,
    TuneConfig, TuneError, load_best_model, load_data, run,
};
use ml_dataset::{ImageShape, SyntheticDataset};
use ml_models::CheckpointFormat;
use ml_search::{Algorithm, TpeConfig, Trials};
use ml_training::evaluate;

/// Burn's backend seed is process-global; runs in this file take turns.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

fn assignments(trials: &Trials) -> Vec<ml_search::Assignment> {
    trials
        .records()
        .iter()
        .map(|r| r.assignment.clone())
        .collect()
}

fn tiny_config(max_evals: usize, seed: u64) -> TuneConfig {
    let mut config = TuneConfig::default().with_synthetic(
        SyntheticDataset::new(48, 24)
            .with_shape(ImageShape::new(3, 8, 8))
            .with_seed(seed),
    );
    config.choices = ChoiceSets {
        conv1_filters: vec![2, 4],
        conv2_filters: vec![2, 4],
        dense_units: vec![8, 16, 32],
        learning_rate: vec![0.001, 0.01],
        batch_size: vec![8, 16],
    };
    config.training.epochs = 2;
    config.search.max_evals = max_evals;
    config.search.seed = Some(seed);
    config
}

#[test]
fn ten_trials_yield_one_best_model() {
    let _guard = serial();
    let config = tiny_config(10, 11);
    let report = run(&config).unwrap();

    assert_eq!(report.trials.len(), 10);
    assert_eq!(report.best.total_trials, 10);
    assert!(report.model.is_some());

    let best = &report.best;
    assert!((-1.0..=0.0).contains(&best.loss), "loss {}", best.loss);
    for loss in report.trials.losses() {
        assert!(best.loss <= loss);
    }

    let params = best.params;
    assert!(config.choices.conv1_filters.contains(&params.conv1_filters));
    assert!(config.choices.conv2_filters.contains(&params.conv2_filters));
    assert!(config.choices.dense_units.contains(&params.dense_units));
    assert!(config.choices.learning_rate.contains(&params.learning_rate));
    assert!(config.choices.batch_size.contains(&params.batch_size));
    assert_eq!(HyperParams::from_assignment(&best.assignment).unwrap(), params);

    let test = best.test.unwrap();
    assert_eq!(test.samples, 24);
    assert!((0.0..=1.0).contains(&test.accuracy));
}

#[test]
fn every_trial_stays_inside_the_space() {
    let _guard = serial();
    let config = tiny_config(6, 2);
    let report = run(&config).unwrap();
    let space = config.choices.search_space().unwrap();

    for record in report.trials.records() {
        assert!(space.validate_assignment(&record.assignment).is_ok());
        if let Some(loss) = record.ok_loss() {
            assert!((-1.0..=0.0).contains(&loss));
        }
    }
}

#[test]
fn same_seed_proposes_same_assignments() {
    let _guard = serial();
    let first = run(&tiny_config(4, 5)).unwrap();
    let second = run(&tiny_config(4, 5)).unwrap();

    assert_eq!(assignments(&first.trials), assignments(&second.trials));
    assert_eq!(first.best.assignment, second.best.assignment);
}

#[test]
fn same_seed_same_best_once_tpe_model_is_used() {
    let _guard = serial();
    let config = || {
        let mut config = tiny_config(12, 21);
        config.search.algorithm = Algorithm::Tpe(TpeConfig::default().with_startup_trials(3));
        config
    };
    let first = run(&config()).unwrap();
    let second = run(&config()).unwrap();

    assert_eq!(first.trials.len(), 12);
    assert_eq!(assignments(&first.trials), assignments(&second.trials));
    assert_eq!(first.best.assignment, second.best.assignment);
    assert_eq!(first.best.trial_id, second.best.trial_id);
}

#[test]
fn random_search_also_completes() {
    let _guard = serial();
    let mut config = tiny_config(3, 8);
    config.search.algorithm = Algorithm::Random;
    let report = run(&config).unwrap();
    assert_eq!(report.trials.len(), 3);
    assert!(report.model.is_some());
}

#[test]
fn outputs_are_written_and_resumable() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let config = tiny_config(3, 4).with_output_dir(dir.path());
    let report = run(&config).unwrap();

    let trials = Trials::load_json(&dir.path().join(TRIALS_FILE)).unwrap();
    assert_eq!(trials.len(), 3);

    let text = std::fs::read_to_string(dir.path().join(BEST_RUN_FILE)).unwrap();
    let saved: BestRun = serde_json::from_str(&text).unwrap();
    assert_eq!(saved.trial_id, report.best.trial_id);
    let checkpoint = saved.checkpoint.unwrap();
    assert!(checkpoint.exists());
    assert_eq!(checkpoint.extension().and_then(|e| e.to_str()), Some("bin"));

    let mut resumed = tiny_config(5, 4).with_output_dir(dir.path());
    resumed.resume = true;
    let report = run(&resumed).unwrap();
    assert_eq!(report.trials.len(), 5);
    assert_eq!(report.best.total_trials, 5);
    assert_eq!(Trials::load_json(&dir.path().join(TRIALS_FILE)).unwrap().len(), 5);
}

#[test]
fn best_model_reloads_from_output_directory() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let config = tiny_config(3, 6).with_output_dir(dir.path());
    let report = run(&config).unwrap();

    let device = Device::default();
    let (best, model) = load_best_model(dir.path(), &device).unwrap();
    assert_eq!(best, report.best);
    assert_eq!(best.model.dense_units, best.params.dense_units);

    let dataset = load_data(&config.data).unwrap();
    let reloaded =
        evaluate::<EvalBackend, _>(&model, &dataset.test, config.eval_batch_size, &device).unwrap();
    let original = report.best.test.unwrap();
    assert_eq!(reloaded.samples, original.samples);
    assert!((reloaded.accuracy - original.accuracy).abs() < 1e-6);
    assert!((reloaded.loss - original.loss).abs() < 1e-4);
}

#[test]
fn json_checkpoint_reloads_too() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let mut config = tiny_config(2, 7).with_output_dir(dir.path());
    config.checkpoint_format = CheckpointFormat::Json;
    let report = run(&config).unwrap();

    let checkpoint = report.best.checkpoint.clone().unwrap();
    assert_eq!(checkpoint.extension().and_then(|e| e.to_str()), Some("json"));
    let (best, _model) = load_best_model(dir.path(), &Device::default()).unwrap();
    assert_eq!(best.checkpoint, Some(checkpoint));
}

#[test]
fn reload_without_outputs_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_best_model(dir.path(), &Device::default()),
        Err(TuneError::Io(_))
    ));
}

#[test]
fn invalid_configuration_is_rejected_before_training() {
    let mut config = tiny_config(3, 1);
    config.choices.dense_units.clear();
    assert!(matches!(run(&config), Err(TuneError::InvalidConfig(_) | TuneError::Search(_))));

    let mut config = tiny_config(3, 1);
    config.resume = true;
    assert!(matches!(run(&config), Err(TuneError::InvalidConfig(_))));
}
