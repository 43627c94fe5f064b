//! Result and error types for richmedia.

use thiserror::Error;

/// Result type for media operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while building, materializing or binding media
#[derive(Debug, Error)]
pub enum MediaError {
    /// Source data of a type the constructor cannot accept
    #[error("Unsupported input: {message}")]
    UnsupportedInput {
        /// Error message
        message: String,
    },

    /// Row length does not match the table's column count
    #[error("Row has {actual} cells but the table has {expected} columns")]
    RowLength {
        /// Number of columns in the table
        expected: usize,
        /// Number of cells in the rejected row
        actual: usize,
    },

    /// Video format outside the supported whitelist
    #[error("Unsupported video format: {format}")]
    UnsupportedFormat {
        /// Requested format or extension
        format: String,
    },

    /// Column label that is neither a string nor an integer
    #[error("Invalid column label: {message}")]
    InvalidColumn {
        /// Error message
        message: String,
    },

    /// Operation called in the wrong lifecycle state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Every encoder strategy failed; carries the last failure
    #[error("Video encoding failed: {message}")]
    Encoding {
        /// Error message
        message: String,
    },

    /// Settings could not be parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Array reshape failed
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MediaError {
    /// Create an unsupported input error
    #[must_use]
    pub fn unsupported_input(message: impl Into<String>) -> Self {
        Self::UnsupportedInput {
            message: message.into(),
        }
    }

    /// Create an unsupported format error
    #[must_use]
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create an invalid column error
    #[must_use]
    pub fn invalid_column(message: impl Into<String>) -> Self {
        Self::InvalidColumn {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an encoding error
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error reports a lifecycle state violation
    #[must_use]
    pub const fn is_state_error(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}
