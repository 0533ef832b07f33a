//! Error types for the RF observatory pipeline.
//!
//! Per-frame errors are local and recoverable: the caller drops the frame and
//! keeps streaming. Configuration errors are fatal at construction time.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all observatory operations.
#[derive(Error, Debug)]
pub enum ObservatoryError {
    /// A sample frame was rejected
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while extracting features from a single frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Frame has {actual} samples, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Non-finite sample at index {index}")]
    InvalidSample { index: usize },

    #[error("Invalid frame metadata: {reason}")]
    InvalidMetadata { reason: String },

    #[error("Spectral power overflowed at bin {bin}")]
    PowerOverflow { bin: usize },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file '{path}': {source}")]
    LoadFailed {
        path: Box<PathBuf>,
        source: std::io::Error,
    },

    #[error("Invalid config format in '{path}': {source}")]
    InvalidFormat {
        path: Box<PathBuf>,
        source: toml::de::Error,
    },

    #[error("Config validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Failed to save config to '{path}': {source}")]
    SaveFailed {
        path: Box<PathBuf>,
        source: std::io::Error,
    },

    #[error("Config serialization failed: {source}")]
    SerializationFailed { source: toml::ser::Error },
}

/// Errors writing record tables or tile geometry.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write '{path}': {source}")]
    Io {
        path: Box<PathBuf>,
        source: std::io::Error,
    },

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("GeoJSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for observatory operations
pub type Result<T, E = ObservatoryError> = std::result::Result<T, E>;

impl ConfigError {
    /// Shorthand for a validation failure.
    pub fn invalid(reason: impl Into<String>) -> Self {
        ConfigError::ValidationFailed {
            reason: reason.into(),
        }
    }
}

impl FrameError {
    /// Per-frame errors never poison pipeline state, so the stream can continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::ShapeMismatch { .. }
                | FrameError::InvalidSample { .. }
                | FrameError::InvalidMetadata { .. }
                | FrameError::PowerOverflow { .. }
        )
    }

    /// Get suggested recovery action
    pub fn recovery_hint(&self) -> Option<&str> {
        match self {
            FrameError::ShapeMismatch { .. } => {
                Some("Check that the source frame size matches rf.fft_size")
            }
            FrameError::InvalidSample { .. } => {
                Some("Source produced NaN/Inf samples; check driver gain and scaling")
            }
            FrameError::InvalidMetadata { .. } => None,
            FrameError::PowerOverflow { .. } => {
                Some("Input level exceeds the representable range; reduce source gain")
            }
        }
    }
}
