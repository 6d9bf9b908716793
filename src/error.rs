//! Error types for the scanning collaborators
//!
//! The normalizer, grouper and matcher never fail; absence of a result is their
//! error channel. These errors only cross the camera, OCR, remote search and
//! storage boundaries.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by scanning collaborators
#[derive(Error, Debug)]
pub enum ScanError {
    /// Camera access was refused by the user or the platform
    #[error("Camera access denied")]
    CameraDenied,

    /// Camera device missing or failed while scanning
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    /// Text recognizer failed on a frame
    #[error("Recognition error: {0}")]
    Recognition(String),

    /// Remote wine search failed
    #[error("Remote search error: {0}")]
    RemoteSearch(String),

    /// A collaborator call exceeded its time budget
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Transport level HTTP failure
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation not allowed in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ScanError {
    /// Whether this error ends the scanning session and must be shown to the user.
    ///
    /// Everything else is absorbed into "this frame produced nothing".
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, ScanError::CameraDenied | ScanError::CameraUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
