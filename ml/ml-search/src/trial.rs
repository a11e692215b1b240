//! Trial outcomes and the persisted trial history.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::space::Assignment;

/// Whether a trial produced a usable loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    /// The objective returned a finite loss.
    Ok,
    /// The objective reported a failure; the trial is ignored by samplers.
    Failed,
}

/// What an objective returns for one assignment.
///
/// `A` is an arbitrary artifact (typically the trained model) that the
/// search keeps only for the best trial.
///
/// # Example
///
/// ```
/// use ml_search::{TrialOutcome, TrialStatus};
///
/// let outcome: TrialOutcome<()> = TrialOutcome::ok(-0.71).with_metric("val_accuracy", 0.71);
/// assert_eq!(outcome.status, TrialStatus::Ok);
/// assert_eq!(outcome.metrics["val_accuracy"], 0.71);
/// ```
#[derive(Debug, Clone)]
pub struct TrialOutcome<A> {
    /// Loss to minimize.
    pub loss: f64,

    /// Outcome status.
    pub status: TrialStatus,

    /// Named side metrics.
    pub metrics: BTreeMap<String, f64>,

    /// Optional artifact.
    pub artifact: Option<A>,

    /// Failure description for [`TrialStatus::Failed`].
    pub failure: Option<String>,
}

impl<A> TrialOutcome<A> {
    /// A successful outcome with the given loss.
    #[must_use]
    pub const fn ok(loss: f64) -> Self {
        Self {
            loss,
            status: TrialStatus::Ok,
            metrics: BTreeMap::new(),
            artifact: None,
            failure: None,
        }
    }

    /// A failed outcome.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            loss: f64::NAN,
            status: TrialStatus::Failed,
            metrics: BTreeMap::new(),
            artifact: None,
            failure: Some(reason.into()),
        }
    }

    /// Adds a named metric.
    #[must_use]
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// Attaches an artifact.
    #[must_use]
    pub fn with_artifact(mut self, artifact: A) -> Self {
        self.artifact = Some(artifact);
        self
    }
}

/// One evaluated assignment in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Sequential trial id (0-based).
    pub id: usize,

    /// The assignment evaluated.
    pub assignment: Assignment,

    /// Loss, present for [`TrialStatus::Ok`].
    pub loss: Option<f64>,

    /// Outcome status.
    pub status: TrialStatus,

    /// Named side metrics.
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,

    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    /// Wall-clock time of the objective call in seconds.
    #[serde(default)]
    pub duration_secs: f64,
}

impl TrialRecord {
    /// Builds a record from an objective outcome, dropping the artifact.
    ///
    /// A nominally successful outcome with a non-finite loss is recorded as
    /// failed.
    #[must_use]
    pub fn from_outcome<A>(
        id: usize,
        assignment: Assignment,
        outcome: &TrialOutcome<A>,
        duration_secs: f64,
    ) -> Self {
        let (status, loss, failure) = match outcome.status {
            TrialStatus::Ok if outcome.loss.is_finite() => (TrialStatus::Ok, Some(outcome.loss), None),
            TrialStatus::Ok => (
                TrialStatus::Failed,
                None,
                Some(format!("non-finite loss {}", outcome.loss)),
            ),
            TrialStatus::Failed => (TrialStatus::Failed, None, outcome.failure.clone()),
        };
        Self {
            id,
            assignment,
            loss,
            status,
            metrics: outcome.metrics.clone(),
            failure,
            duration_secs,
        }
    }

    /// Returns the loss of a successful trial.
    #[must_use]
    pub fn ok_loss(&self) -> Option<f64> {
        match self.status {
            TrialStatus::Ok => self.loss.filter(|l| l.is_finite()),
            TrialStatus::Failed => None,
        }
    }

    /// Gets a named metric.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

/// Ordered history of evaluated trials.
///
/// # Example
///
/// ```
/// use ml_search::{Assignment, TrialOutcome, TrialRecord, Trials};
///
/// let mut trials = Trials::new();
/// for (id, loss) in [-0.4, -0.7, -0.6].into_iter().enumerate() {
///     let outcome: TrialOutcome<()> = TrialOutcome::ok(loss);
///     trials.push(TrialRecord::from_outcome(id, Assignment::new(), &outcome, 0.0));
/// }
/// assert_eq!(trials.best().map(|t| t.id), Some(1));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trials {
    records: Vec<TrialRecord>,
}

impl Trials {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    pub fn push(&mut self, record: TrialRecord) {
        self.records.push(record);
    }

    /// Number of recorded trials, failed ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Id for the next trial.
    #[must_use]
    pub fn next_id(&self) -> usize {
        self.records.iter().map(|r| r.id + 1).max().unwrap_or(0)
    }

    /// All records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    /// Successful records in insertion order.
    pub fn completed(&self) -> impl Iterator<Item = &TrialRecord> {
        self.records.iter().filter(|r| r.ok_loss().is_some())
    }

    /// Number of successful records.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed().count()
    }

    /// Losses of successful records in insertion order.
    #[must_use]
    pub fn losses(&self) -> Vec<f64> {
        self.records.iter().filter_map(TrialRecord::ok_loss).collect()
    }

    /// The successful record with the lowest loss; the earliest wins ties.
    #[must_use]
    pub fn best(&self) -> Option<&TrialRecord> {
        self.records
            .iter()
            .filter_map(|r| r.ok_loss().map(|loss| (loss, r)))
            .fold(None, |best: Option<(f64, &TrialRecord)>, (loss, record)| match best {
                Some((best_loss, _)) if best_loss <= loss => best,
                _ => Some((loss, record)),
            })
            .map(|(_, record)| record)
    }

    /// Writes the history as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Reads a history written by [`Trials::save_json`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_json(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
