//! Vision/OCR Layer
//!
//! Turns captured frames into positioned text fragments and groups them into
//! wine-entry candidates. Recognizers are external collaborators behind the
//! `TextRecognizer` trait:
//! - Replay of recorded fragments (tests, offline runs)
//! - A remote OCR service over HTTP

pub mod grouping;
pub mod ocr;
pub mod remote_ocr;
pub mod replay;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::capture::CapturedFrame;
use crate::config::OcrSettings;
use crate::error::Result;

pub use grouping::{CandidateGrouper, WineTextCandidate};
pub use ocr::{BoundingBox, TextFragment};
pub use remote_ocr::RemoteOcr;
pub use replay::ReplayRecognizer;

/// OCR backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackend {
    /// Recorded fragments replayed frame by frame
    #[default]
    Replay,
    /// HTTP recognition service
    Remote,
}

/// Recognition accuracy setting requested from the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionLevel {
    /// Slower, language-corrected recognition
    #[default]
    Accurate,
    /// Lower accuracy fallback used after repeated failures
    Fast,
}

/// A text recognizer for camera frames
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize text lines in a frame
    async fn recognize_frame(
        &self,
        frame: &CapturedFrame,
        level: RecognitionLevel,
        language: &str,
    ) -> Result<Vec<TextFragment>>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Recognizer health as seen by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecognizerHealth {
    /// Level currently requested from the recognizer
    pub level: RecognitionLevel,
    /// Failures since the last success or level change
    pub consecutive_failures: u32,
    /// Fast mode kept failing; stays set for the rest of the session
    pub faulted: bool,
}

impl RecognizerHealth {
    pub fn is_degraded(&self) -> bool {
        self.level == RecognitionLevel::Fast
    }
}

/// Result of vision processing on a frame
#[derive(Debug)]
pub struct VisionResult {
    /// Fragments that cleared the confidence floor
    pub fragments: Vec<TextFragment>,
    /// Level the frame was recognized at
    pub level: RecognitionLevel,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Vision processing pipeline around one recognizer
///
/// Cheap to clone; clones share the recognizer and its health record.
#[derive(Clone)]
pub struct VisionPipeline {
    recognizer: Arc<dyn TextRecognizer>,
    settings: OcrSettings,
    health: Arc<Mutex<RecognizerHealth>>,
}

impl VisionPipeline {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, settings: OcrSettings) -> Self {
        info!(
            "Vision pipeline using {} recognizer (language {})",
            recognizer.name(),
            settings.language
        );
        Self {
            recognizer,
            settings,
            health: Arc::new(Mutex::new(RecognizerHealth::default())),
        }
    }

    /// Current recognizer health
    pub fn health(&self) -> RecognizerHealth {
        *self.health.lock()
    }

    /// Recognize a frame and drop fragments below the confidence floor.
    ///
    /// Failures are counted toward degradation before being returned.
    pub async fn process(&self, frame: &CapturedFrame) -> Result<VisionResult> {
        let level = self.health.lock().level;
        let start = Instant::now();

        let outcome = self
            .recognizer
            .recognize_frame(frame, level, &self.settings.language)
            .await;

        match outcome {
            Ok(raw) => {
                self.record_success();
                let total = raw.len();
                let fragments: Vec<TextFragment> = raw
                    .into_iter()
                    .filter(|f| f.confidence >= self.settings.min_fragment_confidence)
                    .filter(|f| !f.text.trim().is_empty())
                    .collect();

                let processing_time = start.elapsed();
                debug!(
                    "Vision processing ({:?}) of frame {} complete in {:?}: {}/{} fragments kept",
                    level,
                    frame.sequence,
                    processing_time,
                    fragments.len(),
                    total
                );

                Ok(VisionResult {
                    fragments,
                    level,
                    processing_time_ms: processing_time.as_millis() as u64,
                })
            }
            Err(e) => {
                self.record_failure();
                debug!("Recognition of frame {} failed: {}", frame.sequence, e);
                Err(e)
            }
        }
    }

    fn record_success(&self) {
        self.health.lock().consecutive_failures = 0;
    }

    fn record_failure(&self) {
        let mut health = self.health.lock();
        health.consecutive_failures += 1;

        match health.level {
            RecognitionLevel::Accurate
                if health.consecutive_failures >= self.settings.degrade_after_failures =>
            {
                warn!(
                    "{} recognizer failed {} times in a row, switching to fast recognition",
                    self.recognizer.name(),
                    health.consecutive_failures
                );
                health.level = RecognitionLevel::Fast;
                health.consecutive_failures = 0;
            }
            RecognitionLevel::Fast
                if !health.faulted
                    && health.consecutive_failures >= self.settings.fault_after_failures =>
            {
                error!(
                    "{} recognizer keeps failing in fast mode",
                    self.recognizer.name()
                );
                health.faulted = true;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(text: &str, confidence: f32) -> TextFragment {
        TextFragment::new(text, BoundingBox::new(0.1, 0.5, 0.5, 0.02), confidence)
    }

    #[tokio::test]
    async fn test_confidence_floor_applied() {
        let replay = ReplayRecognizer::new(vec![vec![
            fragment("Opus One", 0.9),
            fragment("smudge", 0.2),
            fragment("   ", 0.99),
        ]]);
        let pipeline = VisionPipeline::new(Arc::new(replay), OcrSettings::default());

        let result = pipeline.process(&CapturedFrame::placeholder(0)).await.unwrap();
        assert_eq!(result.fragments.len(), 1);
        assert_eq!(result.fragments[0].text, "Opus One");
        assert_eq!(result.level, RecognitionLevel::Accurate);
    }

    #[tokio::test]
    async fn test_degrades_after_repeated_failures() {
        let replay = ReplayRecognizer::new(vec![vec![]; 10]).with_failures(0..3);
        let pipeline = VisionPipeline::new(Arc::new(replay), OcrSettings::default());

        for seq in 0..2 {
            assert!(pipeline.process(&CapturedFrame::placeholder(seq)).await.is_err());
        }
        assert!(!pipeline.health().is_degraded());

        assert!(pipeline.process(&CapturedFrame::placeholder(2)).await.is_err());
        assert!(pipeline.health().is_degraded());

        // fast mode sticks after a success
        let result = pipeline.process(&CapturedFrame::placeholder(3)).await.unwrap();
        assert_eq!(result.level, RecognitionLevel::Fast);
        assert!(pipeline.health().is_degraded());
        assert!(!pipeline.health().faulted);
    }

    #[tokio::test]
    async fn test_faults_when_fast_mode_keeps_failing() {
        let replay = ReplayRecognizer::new(vec![vec![]; 10]).with_failures(0..6);
        let pipeline = VisionPipeline::new(Arc::new(replay), OcrSettings::default());

        for seq in 0..5 {
            let _ = pipeline.process(&CapturedFrame::placeholder(seq)).await;
        }
        assert!(pipeline.health().is_degraded());
        assert!(!pipeline.health().faulted);

        let _ = pipeline.process(&CapturedFrame::placeholder(5)).await;
        assert!(pipeline.health().faulted);

        // a later success does not clear the fault
        pipeline.process(&CapturedFrame::placeholder(6)).await.unwrap();
        assert!(pipeline.health().faulted);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let replay = ReplayRecognizer::new(vec![vec![]; 10]).with_failures([0, 1, 3, 4]);
        let pipeline = VisionPipeline::new(Arc::new(replay), OcrSettings::default());

        for seq in 0..5 {
            let _ = pipeline.process(&CapturedFrame::placeholder(seq)).await;
        }
        assert!(!pipeline.health().is_degraded());
        assert_eq!(pipeline.health().consecutive_failures, 2);
    }
}
