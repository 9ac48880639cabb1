//! Error types for background replacement operations

use crate::segmentation::SegmentationError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for background replacement operations
pub type Result<T> = std::result::Result<T, CompositeError>;

/// Coarse classification of a [`CompositeError`]
///
/// Callers that only need to branch on the failure class (retry, report,
/// abort) can match on this instead of the full error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A source image could not be read or decoded
    LoadFailure,
    /// The background does not cover the subject footprint
    DimensionMismatch,
    /// Pixel layout or mask geometry violates the compositor contract
    FormatError,
    /// The mask provider failed
    SegmentationError,
    /// The finished buffer could not be encoded
    EncodeFailure,
    /// The encoded output could not be stored
    PersistFailure,
    /// Invalid configuration value
    InvalidConfig,
    /// Unexpected internal condition
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::LoadFailure => "load_failure",
            Self::DimensionMismatch => "dimension_mismatch",
            Self::FormatError => "format_error",
            Self::SegmentationError => "segmentation_error",
            Self::EncodeFailure => "encode_failure",
            Self::PersistFailure => "persist_failure",
            Self::InvalidConfig => "invalid_config",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Error types for the compositing pipeline
#[derive(Error, Debug)]
pub enum CompositeError {
    /// Source image could not be read or decoded
    #[error("Failed to load image: {0}")]
    Load(String),

    /// Background is smaller than the subject in at least one axis
    #[error(
        "Background {}x{} does not cover subject {}x{}",
        background.0,
        background.1,
        subject.0,
        subject.1
    )]
    DimensionMismatch {
        /// Subject dimensions (width, height)
        subject: (u32, u32),
        /// Background dimensions (width, height)
        background: (u32, u32),
    },

    /// Buffer layout or mask geometry is not what the compositor expects
    #[error("Format error: {0}")]
    Format(String),

    /// Mask provider failure, cause attached verbatim
    #[error("Segmentation failed using '{provider}': {source}")]
    Segmentation {
        /// Name of the provider that failed
        provider: String,
        /// Underlying provider error
        #[source]
        source: SegmentationError,
    },

    /// Output encoding failed
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// Encoded output could not be written
    #[error("Failed to persist output to '{}': {source}", path.display())]
    Persist {
        /// Destination that could not be written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CompositeError {
    /// Create a new load error
    pub fn load<S: Into<String>>(msg: S) -> Self {
        Self::Load(msg.into())
    }

    /// Create a new format error
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Self::Format(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a dimension mismatch error
    #[must_use]
    pub fn dimension_mismatch(subject: (u32, u32), background: (u32, u32)) -> Self {
        Self::DimensionMismatch {
            subject,
            background,
        }
    }

    /// Wrap a provider failure
    pub fn segmentation<S: Into<String>>(provider: S, source: SegmentationError) -> Self {
        Self::Segmentation {
            provider: provider.into(),
            source,
        }
    }

    /// Create a persist error for a destination path
    pub fn persist<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Persist {
            path: path.into(),
            source,
        }
    }

    /// Create image loading error with origin context
    pub fn load_error<E: std::fmt::Display>(role: &str, origin: &str, error: E) -> Self {
        Self::Load(format!(
            "Could not decode {} image from {}: {}. Supported formats: PNG, JPEG, WebP, TIFF",
            role, origin, error
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create an internal error naming the pipeline stage that broke
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };
        Self::Internal(format!(
            "Processing failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }

    /// Get the structured kind of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Load(_) => ErrorKind::LoadFailure,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::Format(_) => ErrorKind::FormatError,
            Self::Segmentation { .. } => ErrorKind::SegmentationError,
            Self::Encode(_) => ErrorKind::EncodeFailure,
            Self::Persist { .. } => ErrorKind::PersistFailure,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}
