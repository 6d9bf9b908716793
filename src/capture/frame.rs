//! Frame data structures for camera content

use std::time::Instant;

/// A captured camera frame
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Monotonic frame number assigned by the camera feed
    pub sequence: u64,
    /// Raw pixel data (format is up to the recognizer)
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(sequence: u64, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            sequence,
            data,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// A frame without pixels, for recognizers that replay recorded text
    pub fn placeholder(sequence: u64) -> Self {
        Self::new(sequence, Vec::new(), 0, 0)
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
