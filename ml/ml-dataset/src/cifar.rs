//! CIFAR-10 binary format loader.
//!
//! The binary distribution (`cifar-10-batches-bin`) stores each image as a
//! single record: one label byte followed by 3072 pixel bytes (the red,
//! green, then blue 32x32 planes, row-major). That layout is already
//! channel-first, so records are copied without reordering.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DatasetError, Result};
use crate::images::{Dataset, ImageShape, LabeledImages, NUM_CLASSES};

/// Training batch file names, in load order.
pub const TRAIN_BATCHES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];

/// Test batch file name.
pub const TEST_BATCH: &str = "test_batch.bin";

/// Bytes per record: one label byte plus one image.
pub const RECORD_LEN: usize = 1 + 3 * 32 * 32;

/// Loads CIFAR-10 from a `cifar-10-batches-bin` directory.
///
/// # Example
///
/// ```no_run
/// use ml_dataset::Cifar10Loader;
///
/// let dataset = Cifar10Loader::new("data/cifar-10-batches-bin")
///     .with_train_limit(5000)
///     .load()?;
/// assert_eq!(dataset.train.num_classes(), 10);
/// # Ok::<(), ml_dataset::DatasetError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cifar10Loader {
    /// Directory holding the batch files.
    pub root: PathBuf,
    /// Keep at most this many training images.
    pub train_limit: Option<usize>,
    /// Keep at most this many test images.
    pub test_limit: Option<usize>,
}

impl Cifar10Loader {
    /// Creates a loader for the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            train_limit: None,
            test_limit: None,
        }
    }

    /// Caps the number of training images.
    #[must_use]
    pub const fn with_train_limit(mut self, limit: usize) -> Self {
        self.train_limit = Some(limit);
        self
    }

    /// Caps the number of test images.
    #[must_use]
    pub const fn with_test_limit(mut self, limit: usize) -> Self {
        self.test_limit = Some(limit);
        self
    }

    /// Loads both partitions.
    ///
    /// # Errors
    ///
    /// Returns an error if any batch file is missing or malformed.
    pub fn load(&self) -> Result<Dataset> {
        let train = self.load_train()?;
        let test = self.load_test()?;

        info!(
            root = %self.root.display(),
            train = train.len(),
            test = test.len(),
            "Loaded CIFAR-10"
        );

        Ok(Dataset::new(train, test))
    }

    /// Loads the training partition (all five batches, up to the limit).
    ///
    /// # Errors
    ///
    /// Returns an error if a required batch file is missing or malformed.
    pub fn load_train(&self) -> Result<LabeledImages> {
        let mut train = LabeledImages::empty(ImageShape::CIFAR10, NUM_CLASSES);
        for name in TRAIN_BATCHES {
            if self.train_limit.is_some_and(|limit| train.len() >= limit) {
                break;
            }
            train.extend(read_batch(&self.root.join(name))?)?;
        }
        Ok(match self.train_limit {
            Some(limit) => train.truncated(limit),
            None => train,
        })
    }

    /// Loads the test partition (up to the limit).
    ///
    /// # Errors
    ///
    /// Returns an error if the test batch is missing or malformed.
    pub fn load_test(&self) -> Result<LabeledImages> {
        let test = read_batch(&self.root.join(TEST_BATCH))?;
        Ok(match self.test_limit {
            Some(limit) => test.truncated(limit),
            None => test,
        })
    }
}

/// Reads one batch file.
///
/// # Errors
///
/// Returns an error if the file is missing, truncated, or holds a label
/// outside `0..10`.
pub fn read_batch(path: &Path) -> Result<LabeledImages> {
    if !path.exists() {
        return Err(DatasetError::batch_not_found(path.display().to_string()));
    }
    let bytes = fs::read(path)?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read CIFAR batch");
    parse_batch(&bytes).map_err(|e| match e {
        DatasetError::InvalidBatch { reason, .. } => {
            DatasetError::invalid_batch(path.display().to_string(), reason)
        }
        other => other,
    })
}

/// Parses the contents of one batch file.
///
/// # Errors
///
/// Returns [`DatasetError::InvalidBatch`] if the length is not a multiple of
/// [`RECORD_LEN`], and [`DatasetError::ClassOutOfRange`] for bad labels.
pub fn parse_batch(bytes: &[u8]) -> Result<LabeledImages> {
    if bytes.len() % RECORD_LEN != 0 {
        return Err(DatasetError::invalid_batch(
            "<memory>",
            format!(
                "length {} is not a multiple of the {RECORD_LEN}-byte record",
                bytes.len()
            ),
        ));
    }

    let records = bytes.len() / RECORD_LEN;
    let mut classes = Vec::with_capacity(records);
    let mut raw = Vec::with_capacity(records * (RECORD_LEN - 1));
    for record in bytes.chunks_exact(RECORD_LEN) {
        classes.push(record[0]);
        raw.extend_from_slice(&record[1..]);
    }

    LabeledImages::from_raw(ImageShape::CIFAR10, &raw, &classes, NUM_CLASSES)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(class: u8, fill: u8) -> Vec<u8> {
        let mut r = vec![fill; RECORD_LEN];
        r[0] = class;
        r
    }

    fn write_batch(dir: &Path, name: &str, classes: &[u8]) {
        let bytes: Vec<u8> = classes
            .iter()
            .enumerate()
            .flat_map(|(i, &c)| record(c, (i * 40) as u8))
            .collect();
        fs::write(dir.join(name), bytes).unwrap();
    }

    #[test]
    fn parse_batch_records() {
        let mut bytes = record(3, 255);
        bytes.extend(record(7, 0));

        let images = parse_batch(&bytes).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images.shape(), ImageShape::CIFAR10);
        assert_eq!(images.class_of(0), 3);
        assert_eq!(images.class_of(1), 7);
        assert!(images.image(0).iter().all(|&p| (p - 1.0).abs() < 1e-6));
        assert!(images.image(1).iter().all(|&p| p == 0.0));
    }

    #[test]
    fn parse_batch_truncated() {
        let bytes = vec![0u8; RECORD_LEN + 5];
        assert!(matches!(
            parse_batch(&bytes),
            Err(DatasetError::InvalidBatch { .. })
        ));
    }

    #[test]
    fn parse_batch_bad_label() {
        let bytes = record(10, 0);
        assert!(matches!(
            parse_batch(&bytes),
            Err(DatasetError::ClassOutOfRange { class: 10, .. })
        ));
    }

    #[test]
    fn read_batch_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_batch(&dir.path().join(TEST_BATCH));
        assert!(matches!(result, Err(DatasetError::BatchNotFound(_))));
    }

    #[test]
    fn read_batch_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.bin");
        fs::write(&path, [1u8, 2, 3]).unwrap();
        let err = read_batch(&path).unwrap_err();
        assert!(err.to_string().contains("broken.bin"));
    }

    #[test]
    fn loader_reads_all_batches() {
        let dir = tempfile::tempdir().unwrap();
        for name in TRAIN_BATCHES {
            write_batch(dir.path(), name, &[0, 1]);
        }
        write_batch(dir.path(), TEST_BATCH, &[9, 8, 7]);

        let dataset = Cifar10Loader::new(dir.path()).load().unwrap();
        assert_eq!(dataset.train.len(), 10);
        assert_eq!(dataset.test.len(), 3);
        assert_eq!(dataset.test.class_of(0), 9);
    }

    #[test]
    fn loader_limits_stop_early() {
        let dir = tempfile::tempdir().unwrap();
        // Only the first batch exists; the limit must keep the loader from
        // touching the others.
        write_batch(dir.path(), TRAIN_BATCHES[0], &[0, 1, 2, 3]);
        write_batch(dir.path(), TEST_BATCH, &[4, 5, 6]);

        let dataset = Cifar10Loader::new(dir.path())
            .with_train_limit(3)
            .with_test_limit(2)
            .load()
            .unwrap();
        assert_eq!(dataset.train.len(), 3);
        assert_eq!(dataset.test.len(), 2);
    }

    #[test]
    fn loader_missing_train_batch() {
        let dir = tempfile::tempdir().unwrap();
        write_batch(dir.path(), TRAIN_BATCHES[0], &[0]);
        write_batch(dir.path(), TEST_BATCH, &[0]);

        let result = Cifar10Loader::new(dir.path()).load();
        assert!(matches!(result, Err(DatasetError::BatchNotFound(_))));
    }
}
