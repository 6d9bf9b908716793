//! Remote OCR backend
//!
//! Posts raw frame bytes to a recognition service and reads back positioned
//! lines as JSON.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::capture::CapturedFrame;
use crate::error::{Result, ScanError};
use crate::vision::{RecognitionLevel, TextFragment, TextRecognizer};

/// Response body of the recognition service
#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    fragments: Vec<TextFragment>,
}

/// HTTP text recognizer
pub struct RemoteOcr {
    client: Client,
    endpoint: String,
}

impl RemoteOcr {
    pub fn new(endpoint: impl Into<String>, connect_timeout: Duration, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn level_param(level: RecognitionLevel) -> &'static str {
    match level {
        RecognitionLevel::Accurate => "accurate",
        RecognitionLevel::Fast => "fast",
    }
}

#[async_trait]
impl TextRecognizer for RemoteOcr {
    async fn recognize_frame(
        &self,
        frame: &CapturedFrame,
        level: RecognitionLevel,
        language: &str,
    ) -> Result<Vec<TextFragment>> {
        let (width, height) = frame.dimensions();
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("level", level_param(level).to_string()),
                ("language", language.to_string()),
                ("width", width.to_string()),
                ("height", height.to_string()),
            ])
            .body(frame.data.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Recognition(format!(
                "OCR service returned status {status}"
            )));
        }

        let body: RecognizeResponse = response.json().await?;
        debug!(
            "Remote OCR returned {} fragments for frame {}",
            body.fragments.len(),
            frame.sequence
        );
        Ok(body.fragments)
    }

    fn name(&self) -> &str {
        "remote"
    }
}
