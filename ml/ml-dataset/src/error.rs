//! Error types for ml-dataset crate.

use thiserror::Error;

/// Errors that can occur in ml-dataset operations.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// A CIFAR batch file could not be parsed.
    #[error("invalid batch file {path}: {reason}")]
    InvalidBatch {
        /// Path to the batch file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// A required batch file is missing.
    #[error("batch file not found: {0}")]
    BatchNotFound(String),

    /// Invalid image shape.
    #[error("invalid image shape: {channels}x{height}x{width}")]
    InvalidShape {
        /// Number of channels.
        channels: usize,
        /// Height in pixels.
        height: usize,
        /// Width in pixels.
        width: usize,
    },

    /// Buffer length does not match the declared shape.
    #[error("length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Which buffer was malformed.
        what: &'static str,
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        actual: usize,
    },

    /// Class id outside `0..num_classes`.
    #[error("class {class} out of range for {num_classes} classes")]
    ClassOutOfRange {
        /// Offending class id.
        class: usize,
        /// Number of classes.
        num_classes: usize,
    },

    /// Invalid split ratio.
    #[error("invalid split ratio: {0} (must be in (0, 1))")]
    InvalidSplitRatio(f32),

    /// Empty dataset.
    #[error("dataset is empty")]
    EmptyDataset,

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),
}

impl DatasetError {
    /// Creates an invalid batch error.
    #[must_use]
    pub fn invalid_batch(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidBatch {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a batch not found error.
    #[must_use]
    pub fn batch_not_found(path: impl Into<String>) -> Self {
        Self::BatchNotFound(path.into())
    }

    /// Creates an invalid shape error.
    #[must_use]
    pub const fn invalid_shape(channels: usize, height: usize, width: usize) -> Self {
        Self::InvalidShape {
            channels,
            height,
            width,
        }
    }

    /// Creates a length mismatch error.
    #[must_use]
    pub const fn length_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Creates a class out of range error.
    #[must_use]
    pub const fn class_out_of_range(class: usize, num_classes: usize) -> Self {
        Self::ClassOutOfRange { class, num_classes }
    }

    /// Creates an invalid split ratio error.
    #[must_use]
    pub const fn invalid_split_ratio(ratio: f32) -> Self {
        Self::InvalidSplitRatio(ratio)
    }

    /// Creates an IO error.
    #[must_use]
    pub fn io(reason: impl Into<String>) -> Self {
        Self::Io(reason.into())
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}

impl From<std::io::Error> for DatasetError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DatasetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for ml-dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_invalid_batch() {
        let err = DatasetError::invalid_batch("data_batch_1.bin", "truncated record");
        assert!(err.to_string().contains("data_batch_1.bin"));
        assert!(err.to_string().contains("truncated record"));
    }

    #[test]
    fn error_batch_not_found() {
        let err = DatasetError::batch_not_found("/data/test_batch.bin");
        assert!(err.to_string().contains("/data/test_batch.bin"));
    }

    #[test]
    fn error_invalid_shape() {
        let err = DatasetError::invalid_shape(0, 32, 32);
        assert!(err.to_string().contains("0x32x32"));
    }

    #[test]
    fn error_length_mismatch() {
        let err = DatasetError::length_mismatch("pixels", 3072, 100);
        assert!(err.to_string().contains("pixels"));
        assert!(err.to_string().contains("3072"));
        assert!(err.to_string().contains("100"));
    }

    #[test]
    fn error_class_out_of_range() {
        let err = DatasetError::class_out_of_range(12, 10);
        assert!(err.to_string().contains("12"));
        assert!(err.to_string().contains("10 classes"));
    }

    #[test]
    fn error_invalid_split_ratio() {
        let err = DatasetError::invalid_split_ratio(1.5);
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn error_validation() {
        let err = DatasetError::validation("label row 3 is not one-hot");
        assert!(err.to_string().contains("not one-hot"));
    }

    #[test]
    fn error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err: DatasetError = io_err.into();
        assert!(matches!(err, DatasetError::Io(_)));
    }

    #[test]
    fn error_from_serde_error() {
        let json_err = serde_json::from_str::<i32>("invalid").unwrap_err();
        let err: DatasetError = json_err.into();
        assert!(matches!(err, DatasetError::Serialization(_)));
    }
}
