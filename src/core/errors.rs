//! Error types for the card scanning pipeline.
//!
//! Errors are layered to match the pipeline's isolation policy: an unreadable
//! source image is fatal for that image only, a degenerate crop is fatal for
//! that candidate only, and a failed trim or extraction call skips cataloging
//! for that one image. Nothing short of a top-level driver failure aborts the
//! batch.

use thiserror::Error;

/// Errors produced by the card scanning pipeline.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The source image could not be decoded. Fatal for that image's run.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// A processed image could not be encoded or written.
    #[error("image save")]
    ImageSave(#[source] image::ImageError),

    /// Input that cannot be processed (missing file, not a regular file, ...).
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the invalid input.
        message: String,
    },

    /// Invalid configuration detected before the run started.
    #[error("configuration: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// The external whitespace trimmer failed or is unavailable.
    #[error("whitespace trim: {message}")]
    Trim {
        /// Trimmer diagnostics (exit status, stderr, or spawn failure).
        message: String,
    },

    /// Network-level failure talking to the extraction service.
    #[error("extraction request")]
    Network(#[from] reqwest::Error),

    /// The extraction service replied with a malformed payload.
    #[error("extraction response parse")]
    Parse(#[from] serde_json::Error),

    /// The extraction service rejected the request.
    #[error("extraction service: {code}: {message}")]
    Api {
        /// HTTP status code returned by the service.
        code: u16,
        /// Error message from the response body.
        message: String,
    },

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// Creates an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ScanError::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        ScanError::Config {
            message: message.into(),
        }
    }
}

/// Convenient result alias for pipeline operations.
pub type ScanResult<T> = Result<T, ScanError>;
