//! Runtime state visible to the presentation layer

use crate::session::ScanState;

/// Runtime state that is not persisted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeState {
    /// Current pipeline state
    pub scan_state: ScanState,
    /// Recognition switched to fast mode
    pub ocr_degraded: bool,
    /// Recognition keeps failing in fast mode
    pub recognizer_faulted: bool,
    /// Camera failure that ended scanning
    pub camera_error: Option<String>,
    /// Last error message (if any)
    pub last_error: Option<String>,
    /// Frames delivered by the camera
    pub frames_received: u64,
    /// Frames dropped by the throttle
    pub frames_throttled: u64,
    /// Processing passes started
    pub passes_started: u64,
    /// Passes superseded or stopped before finishing
    pub passes_cancelled: u64,
    /// Passes whose results were merged
    pub passes_completed: u64,
    /// Passes where the recognizer failed
    pub recognition_failures: u64,
}

impl RuntimeState {
    /// Clear any error state
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Set an error message
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    /// Whether the user needs to be told about a persistent problem
    pub fn needs_attention(&self) -> bool {
        self.camera_error.is_some() || self.recognizer_faulted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_roundtrip() {
        let mut state = RuntimeState::default();
        state.set_error("remote search unavailable");
        assert_eq!(state.last_error.as_deref(), Some("remote search unavailable"));
        state.clear_error();
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_needs_attention() {
        let mut state = RuntimeState::default();
        assert!(!state.needs_attention());

        state.ocr_degraded = true;
        assert!(!state.needs_attention());

        state.recognizer_faulted = true;
        assert!(state.needs_attention());
    }
}
