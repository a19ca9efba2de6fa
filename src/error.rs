//! Error handling for Veil
//!
//! Every failure degrades to "no-op, previous state retained"; callers
//! decide whether to surface the error to the user or just log it.

use thiserror::Error;

/// Result type alias for Veil operations
pub type Result<T> = std::result::Result<T, VeilError>;

/// Main error type for Veil operations
#[derive(Error, Debug)]
pub enum VeilError {
    // Load errors
    #[error("Unreadable media: {reason}")]
    Unreadable {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported cover asset type: {mime}")]
    UnsupportedType { mime: String },

    // Control errors
    #[error("Invalid parameter: {param} = {value} ({reason})")]
    InvalidParameter {
        param: String,
        value: f32,
        reason: String,
    },

    #[error("Track index {index} out of range (playlist has {len} entries)")]
    TrackOutOfRange { index: usize, len: usize },

    #[error("Unknown trigger key: {key}")]
    UnknownKey { key: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VeilError {
    /// Shorthand for an `Unreadable` error without a source
    pub fn unreadable(reason: impl Into<String>) -> Self {
        VeilError::Unreadable {
            reason: reason.into(),
            source: None,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            VeilError::Unreadable { .. } => "UNREADABLE",
            VeilError::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            VeilError::InvalidParameter { .. } => "INVALID_PARAMETER",
            VeilError::TrackOutOfRange { .. } => "TRACK_OUT_OF_RANGE",
            VeilError::UnknownKey { .. } => "UNKNOWN_KEY",
            VeilError::Io(_) => "IO_ERROR",
            VeilError::Wav(_) => "WAV_ERROR",
            VeilError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the user can recover by re-triggering the action
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VeilError::Unreadable { .. }
                | VeilError::UnsupportedType { .. }
                | VeilError::InvalidParameter { .. }
                | VeilError::TrackOutOfRange { .. }
                | VeilError::UnknownKey { .. }
        )
    }

    /// Returns a suggested recovery action for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            VeilError::Unreadable { .. } => "Pick another file; this one could not be decoded as audio",
            VeilError::UnsupportedType { .. } => "Use an image, a PDF, or a .docx document as the cover",
            VeilError::InvalidParameter { .. } => "Adjust the control to a value within its range",
            VeilError::TrackOutOfRange { .. } => "Select a track from the current playlist",
            VeilError::UnknownKey { .. } => "Pick one of the keys listed by `veil-cli keys`",
            VeilError::Io(_) => "Check that the file still exists and is readable",
            _ => "Check the error details and try again",
        }
    }
}
