//! Error handling for Tonearm
//!
//! Input and configuration problems are reported before any processing
//! starts. Every variant carries a stable code and recovery suggestions.

use thiserror::Error;

/// Result type alias for Tonearm operations
pub type Result<T> = std::result::Result<T, TonearmError>;

/// Main error type for Tonearm operations
#[derive(Error, Debug)]
pub enum TonearmError {
    // Caller contract violations
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Unsupported configuration: {param} = {value} (expected {expected})")]
    UnsupportedConfig {
        param: String,
        value: String,
        expected: String,
    },

    // Encoder limits
    #[error("Encoding overflow: {field} needs {required}, limit is {limit}")]
    EncodingOverflow {
        field: &'static str,
        required: u64,
        limit: u64,
    },

    // Bugs
    #[error("Internal invariant violated: {reason}")]
    InternalInvariant { reason: String },

    // Boundary errors (CLI / config files)
    #[error("Invalid WAV file: {reason}")]
    Wav {
        reason: String,
        #[source]
        source: Option<hound::Error>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TonearmError {
    /// Shorthand for an `InvalidInput` error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        TonearmError::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Shorthand for an `UnsupportedConfig` error
    pub fn unsupported(
        param: impl Into<String>,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        TonearmError::UnsupportedConfig {
            param: param.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            TonearmError::InvalidInput { .. } => "INVALID_INPUT",
            TonearmError::UnsupportedConfig { .. } => "UNSUPPORTED_CONFIG",
            TonearmError::EncodingOverflow { .. } => "ENCODING_OVERFLOW",
            TonearmError::InternalInvariant { .. } => "INTERNAL_INVARIANT",
            TonearmError::Wav { .. } => "INVALID_WAV",
            TonearmError::Io(_) => "IO_ERROR",
            TonearmError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable by changing the request
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TonearmError::InternalInvariant { .. })
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TonearmError::InvalidInput { .. } => vec![
                "Check that every channel has the same number of samples",
                "Make sure the buffer is not empty and contains no NaN/Inf values",
            ],
            TonearmError::UnsupportedConfig { .. } => vec![
                "Adjust the stage parameter into its documented range",
                "Disable the stage if it is not needed",
            ],
            TonearmError::EncodingOverflow { .. } => vec![
                "Split the audio into shorter segments",
                "Reduce the channel count before encoding",
            ],
            TonearmError::Wav { .. } => vec![
                "Convert the file to 16/24/32-bit PCM or 32-bit float WAV",
                "The file may be truncated - try re-exporting from source",
            ],
            TonearmError::Io(_) => vec!["Check the path and file permissions"],
            _ => vec![],
        }
    }
}
