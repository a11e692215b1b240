//! Checkpoint persistence for model weights.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{BinFileRecorder, FullPrecisionSettings, PrettyJsonFileRecorder};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ModelError, Result};

/// Supported checkpoint file formats.
///
/// # Example
///
/// ```
/// use ml_models::CheckpointFormat;
///
/// let format = CheckpointFormat::from_extension("bin");
/// assert_eq!(format, Some(CheckpointFormat::Binary));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointFormat {
    /// Burn's `BinFileRecorder` with full precision.
    #[default]
    Binary,

    /// Burn's `PrettyJsonFileRecorder`, for inspection.
    Json,
}

impl CheckpointFormat {
    /// Determines format from file extension.
    ///
    /// - `.bin` -> Binary
    /// - `.json` -> Json
    /// - Other -> None
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "bin" => Some(Self::Binary),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Determines format from file path.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Binary => "bin",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for CheckpointFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binary => write!(f, "binary"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Saves model weights to `path` with the format's extension applied.
///
/// # Returns
///
/// The full path of the written checkpoint.
///
/// # Errors
///
/// Returns [`ModelError::SaveCheckpoint`] if the recorder fails.
///
/// # Example
///
/// ```ignore
/// use ml_models::{save_checkpoint, CheckpointFormat};
///
/// let path = save_checkpoint(model, Path::new("runs/best_model"), CheckpointFormat::Binary)?;
/// ```
pub fn save_checkpoint<B, M>(model: M, path: &Path, format: CheckpointFormat) -> Result<PathBuf>
where
    B: Backend,
    M: Module<B>,
{
    let full_path = path.with_extension(format.extension());
    let shown = full_path.display().to_string();

    match format {
        CheckpointFormat::Binary => {
            let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
            model
                .save_file(full_path.clone(), &recorder)
                .map_err(|e| ModelError::save_checkpoint(&shown, e.to_string()))?;
        }
        CheckpointFormat::Json => {
            let recorder = PrettyJsonFileRecorder::<FullPrecisionSettings>::new();
            model
                .save_file(full_path.clone(), &recorder)
                .map_err(|e| ModelError::save_checkpoint(&shown, e.to_string()))?;
        }
    }

    info!(path = %shown, %format, "Saved checkpoint");
    Ok(full_path)
}

/// Loads weights from a checkpoint into `model`.
///
/// The format is taken from the file extension.
///
/// # Errors
///
/// Returns [`ModelError::CheckpointNotFound`] if the file doesn't exist,
/// [`ModelError::UnsupportedFormat`] for unknown extensions and
/// [`ModelError::LoadCheckpoint`] if the record does not match the model.
pub fn load_checkpoint<B, M>(model: M, path: &Path, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B>,
{
    let shown = path.display().to_string();
    if !path.exists() {
        return Err(ModelError::checkpoint_not_found(shown));
    }

    let format =
        CheckpointFormat::from_path(path).ok_or_else(|| ModelError::unsupported_format(&shown))?;

    let loaded = match format {
        CheckpointFormat::Binary => {
            let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
            model
                .load_file(path.to_path_buf(), &recorder, device)
                .map_err(|e| ModelError::load_checkpoint(&shown, e.to_string()))?
        }
        CheckpointFormat::Json => {
            let recorder = PrettyJsonFileRecorder::<FullPrecisionSettings>::new();
            model
                .load_file(path.to_path_buf(), &recorder, device)
                .map_err(|e| ModelError::load_checkpoint(&shown, e.to_string()))?
        }
    };

    Ok(loaded)
}
