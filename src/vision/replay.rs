//! Recorded OCR replay
//!
//! Serves previously recognized fragments by frame sequence number, so whole
//! scans can be re-run without a camera or an OCR engine.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;

use crate::capture::CapturedFrame;
use crate::error::ScanError;
use crate::vision::{RecognitionLevel, TextFragment, TextRecognizer};

/// Recognizer that replays one fragment list per frame
#[derive(Debug, Clone, Default)]
pub struct ReplayRecognizer {
    frames: Vec<Vec<TextFragment>>,
    failures: HashSet<u64>,
}

impl ReplayRecognizer {
    pub fn new(frames: Vec<Vec<TextFragment>>) -> Self {
        Self {
            frames,
            failures: HashSet::new(),
        }
    }

    /// Load recorded frames from a JSON array of fragment arrays
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read recorded frames {:?}", path))?;
        let frames: Vec<Vec<TextFragment>> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse recorded frames {:?}", path))?;
        Ok(Self::new(frames))
    }

    /// Make recognition fail for the given frame sequence numbers
    pub fn with_failures(mut self, sequences: impl IntoIterator<Item = u64>) -> Self {
        self.failures.extend(sequences);
        self
    }

    /// Number of recorded frames
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl TextRecognizer for ReplayRecognizer {
    async fn recognize_frame(
        &self,
        frame: &CapturedFrame,
        _level: RecognitionLevel,
        _language: &str,
    ) -> crate::error::Result<Vec<TextFragment>> {
        if self.failures.contains(&frame.sequence) {
            return Err(ScanError::Recognition(format!(
                "recorded failure for frame {}",
                frame.sequence
            )));
        }

        // Frames past the end of the recording see nothing
        Ok(usize::try_from(frame.sequence)
            .ok()
            .and_then(|i| self.frames.get(i))
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::BoundingBox;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_replays_by_sequence() {
        let replay = ReplayRecognizer::new(vec![
            vec![TextFragment::new("first", BoundingBox::default(), 0.9)],
            vec![TextFragment::new("second", BoundingBox::default(), 0.9)],
        ]);

        let second = replay
            .recognize_frame(&CapturedFrame::placeholder(1), RecognitionLevel::Accurate, "en-US")
            .await
            .unwrap();
        assert_eq!(second[0].text, "second");

        let past_end = replay
            .recognize_frame(&CapturedFrame::placeholder(9), RecognitionLevel::Accurate, "en-US")
            .await
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let replay = ReplayRecognizer::new(vec![vec![]]).with_failures([0]);
        let result = replay
            .recognize_frame(&CapturedFrame::placeholder(0), RecognitionLevel::Fast, "en-US")
            .await;
        assert!(matches!(result, Err(ScanError::Recognition(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[[{{"text":"Opus","bounding_box":{{"x":0.1,"y":0.78,"width":0.2,"height":0.02}},"confidence":0.9}}],[]]"#
        )
        .unwrap();

        let replay = ReplayRecognizer::from_file(file.path()).unwrap();
        assert_eq!(replay.frame_count(), 2);
    }

    #[test]
    fn test_from_file_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        assert!(ReplayRecognizer::from_file(file.path()).is_err());
    }
}
