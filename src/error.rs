//! Error types for background removal operations

use crate::jobs::JobState;
use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Error taxonomy for submission, processing and retrieval
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Declared file extension is not in the supported set
    #[error("Unsupported file format: {0}")]
    FormatUnsupported(String),

    /// Upload exceeds the configured byte limit
    #[error("File too large: {size} bytes (limit: {limit} bytes)")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Upload could not be decoded as an image
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// The segmentation step failed
    #[error("Segmentation failed: {0}")]
    Segmentation(String),

    /// Writing the result image failed
    #[error("Failed to save image: {0}")]
    Save(String),

    /// Anything else that went wrong while a job was running
    #[error("Unexpected fault: {0}")]
    Unexpected(String),

    /// No job is registered under this identifier
    #[error("Task not found: {0}")]
    JobNotFound(String),

    /// The job exists but has not reached `Completed`
    #[error("Task not completed: {id} is {state} ({progress}%)")]
    ResultNotReady {
        id: String,
        state: JobState,
        progress: u8,
    },

    /// The job completed but its artifact is gone from storage
    #[error("Result file not found for task {id}: {path}")]
    ResultMissing { id: String, path: String },

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image codec errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BgRemovalError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::FormatUnsupported(format.into())
    }

    /// Create a new invalid image error
    pub fn invalid_image<S: Into<String>>(msg: S) -> Self {
        Self::InvalidImage(msg.into())
    }

    /// Create a new segmentation error
    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(msg.into())
    }

    /// Create a new save error
    pub fn save<S: Into<String>>(msg: S) -> Self {
        Self::Save(msg.into())
    }

    /// Create a new unexpected fault error
    pub fn unexpected<S: Into<String>>(msg: S) -> Self {
        Self::Unexpected(msg.into())
    }

    /// Create a new job-not-found error
    pub fn job_not_found<S: Into<String>>(id: S) -> Self {
        Self::JobNotFound(id.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Whether this error was caused by the client's input rather than the service
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::FormatUnsupported(_) | Self::PayloadTooLarge { .. } | Self::InvalidImage(_)
        )
    }
}
