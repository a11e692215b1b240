//! The sequential search driver.

use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::algorithm::Algorithm;
use crate::error::SearchError;
use crate::space::{Assignment, SearchSpace};
use crate::trial::{TrialOutcome, TrialRecord, TrialStatus, Trials};

/// Search budget and reproducibility settings.
///
/// # Example
///
/// ```
/// use ml_search::SearchConfig;
///
/// let config = SearchConfig::default().with_seed(7);
/// assert_eq!(config.max_evals, 10);
/// assert_eq!(config.seed, Some(7));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Suggestion algorithm.
    pub algorithm: Algorithm,

    /// Total trials in the history when the search stops, counting trials
    /// that were already present.
    pub max_evals: usize,

    /// Seed for suggestions; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            max_evals: 10,
            seed: None,
        }
    }
}

impl SearchConfig {
    /// Sets the algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the trial budget.
    #[must_use]
    pub const fn with_max_evals(mut self, max_evals: usize) -> Self {
        self.max_evals = max_evals;
        self
    }

    /// Sets the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// The best trial of a finished search.
#[derive(Debug, Clone)]
pub struct SearchOutcome<A> {
    /// Record of the lowest-loss successful trial.
    pub best: TrialRecord,

    /// Artifact returned with that trial, if it ran in this search.
    pub artifact: Option<A>,
}

/// Minimizes `objective` over `space`.
///
/// Suggestions are made one at a time until `trials` holds
/// `config.max_evals` records; a pre-filled history (e.g. loaded with
/// [`Trials::load_json`]) counts towards the budget and informs the
/// sampler. Failed outcomes are recorded but never chosen as best.
///
/// Only the artifact of the best trial is kept; artifacts of trials that
/// stop being the best are dropped as soon as a better one arrives.
///
/// # Errors
///
/// An error returned by `objective` aborts the search and is propagated
/// unchanged; trials recorded before it stay in `trials`. Search errors,
/// including [`SearchError::NoCompletedTrials`] when no trial succeeded,
/// are converted into `E`.
///
/// # Example
///
/// ```
/// use ml_search::{
///     Algorithm, ParameterDomain, SearchConfig, SearchError, SearchSpace, TrialOutcome, Trials,
///     minimize,
/// };
///
/// let space = SearchSpace::new()
///     .with("x", ParameterDomain::choice([1, 2, 3]))
///     .unwrap();
/// let config = SearchConfig::default()
///     .with_algorithm(Algorithm::Random)
///     .with_max_evals(5)
///     .with_seed(0);
///
/// let mut trials = Trials::new();
/// let outcome = minimize(&space, |a| {
///     let x = a.get_f64("x")?;
///     Ok::<_, SearchError>(TrialOutcome::ok(x).with_artifact(x * 10.0))
/// }, &config, &mut trials)
/// .unwrap();
///
/// assert_eq!(trials.len(), 5);
/// assert_eq!(outcome.artifact, outcome.best.loss.map(|l| l * 10.0));
/// ```
pub fn minimize<A, E, F>(
    space: &SearchSpace,
    mut objective: F,
    config: &SearchConfig,
    trials: &mut Trials,
) -> Result<SearchOutcome<A>, E>
where
    E: From<SearchError>,
    F: FnMut(&Assignment) -> Result<TrialOutcome<A>, E>,
{
    space.validate()?;
    if config.max_evals == 0 {
        return Err(SearchError::invalid_config("max_evals must be > 0").into());
    }

    // Resumed histories continue on a fresh stream of the same seed.
    let mut rng = match config.seed {
        Some(seed) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(trials.len() as u64);
            rng
        }
        None => ChaCha8Rng::from_entropy(),
    };

    if !trials.is_empty() {
        info!(
            existing = trials.len(),
            max_evals = config.max_evals,
            "Resuming search"
        );
    }

    let mut kept: Option<(usize, A)> = None;
    while trials.len() < config.max_evals {
        let id = trials.next_id();
        let assignment = config.algorithm.suggest(space, trials, &mut rng)?;

        let started = Instant::now();
        let mut outcome = objective(&assignment)?;
        let duration = started.elapsed().as_secs_f64();

        let record = TrialRecord::from_outcome(id, assignment, &outcome, duration);
        match (record.status, record.loss) {
            (TrialStatus::Ok, Some(loss)) => {
                info!(
                    trial = id,
                    loss,
                    algorithm = config.algorithm.name(),
                    assignment = %record.assignment,
                    secs = duration,
                    "Trial complete"
                );
            }
            _ => {
                warn!(
                    trial = id,
                    assignment = %record.assignment,
                    failure = record.failure.as_deref().unwrap_or("unknown"),
                    "Trial failed"
                );
            }
        }

        let improves = record.ok_loss().is_some_and(|loss| {
            trials
                .best()
                .and_then(TrialRecord::ok_loss)
                .is_none_or(|best| loss < best)
        });
        if improves {
            kept = outcome.artifact.take().map(|artifact| (id, artifact));
        }
        trials.push(record);
    }

    let best = trials
        .best()
        .cloned()
        .ok_or(SearchError::NoCompletedTrials(trials.len()))?;
    let artifact = kept
        .filter(|(id, _)| *id == best.id)
        .map(|(_, artifact)| artifact);

    info!(
        trial = best.id,
        loss = ?best.loss,
        assignment = %best.assignment,
        "Search finished"
    );
    Ok(SearchOutcome { best, artifact })
}
