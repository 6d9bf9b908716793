//! Camera Boundary
//!
//! The camera itself lives outside the scanner. It reports its authorization
//! once at session start and then pushes frames or a failure into the scan
//! loop as `CameraEvent`s.

pub mod frame;

pub use frame::CapturedFrame;

use crate::error::ScanError;

/// Camera permission state reported when a session starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraAuthorization {
    /// Access granted and a device is present
    Authorized,
    /// The user or platform refused access
    Denied,
    /// No usable camera device
    Unavailable(String),
}

impl CameraAuthorization {
    /// Session-fatal error for anything but `Authorized`
    pub fn into_error(self) -> Option<ScanError> {
        match self {
            CameraAuthorization::Authorized => None,
            CameraAuthorization::Denied => Some(ScanError::CameraDenied),
            CameraAuthorization::Unavailable(reason) => Some(ScanError::CameraUnavailable(reason)),
        }
    }
}

/// Events pushed by the camera feed into the scan loop
#[derive(Debug)]
pub enum CameraEvent {
    /// A new frame is available
    Frame(CapturedFrame),
    /// Device error; only session-fatal errors stop the scan
    Failed(ScanError),
    /// The feed ended (view dismissed)
    Closed,
}
