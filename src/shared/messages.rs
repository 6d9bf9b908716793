//! Notifications sent from the scan pipeline to the presentation layer

use crate::session::RecognizedWine;

/// Events emitted by the session pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Scanning started
    Started,
    /// The match set grew
    MatchesAdded {
        /// Entries added by this pass
        wines: Vec<RecognizedWine>,
        /// Session size after the merge
        total: usize,
    },
    /// A processing pass completed
    FrameProcessed {
        /// Camera frame sequence number
        sequence: u64,
        /// Candidates that matched a wine
        matched: usize,
        /// Admitted candidates without a match, for UI feedback only
        unresolved: Vec<RecognizedWine>,
        /// Pass duration in milliseconds
        elapsed_ms: u64,
    },
    /// Recognition fell back to fast mode
    OcrDegraded,
    /// Recognition keeps failing even in fast mode
    RecognizerFaulted,
    /// Camera denied or lost; scanning has stopped
    CameraFailed(String),
    /// Scanning stopped; session data is kept
    Stopped,
    /// Session entries were discarded
    Cleared,
}
