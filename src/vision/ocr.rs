//! OCR fragment types
//!
//! Positions use normalized frame coordinates with the origin at the bottom
//! left, so a larger `max_y` is higher on screen.

use serde::{Deserialize, Serialize};

/// Normalized rectangle (all values in the 0-1 range)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x: f32,
    /// Bottom edge
    pub y: f32,
    /// Width as a fraction of frame width
    pub width: f32,
    /// Height as a fraction of frame height
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn min_x(&self) -> f32 {
        self.x
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn min_y(&self) -> f32 {
        self.y
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    /// Smallest rectangle covering both boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let min_x = self.min_x().min(other.min_x());
        let min_y = self.min_y().min(other.min_y());
        let max_x = self.max_x().max(other.max_x());
        let max_y = self.max_y().max(other.max_y());
        BoundingBox::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

/// A single line of recognized text, scoped to one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    /// Recognized text
    pub text: String,
    /// Position in the frame
    pub bounding_box: BoundingBox,
    /// Recognition confidence (0.0 - 1.0)
    pub confidence: f32,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, bounding_box: BoundingBox, confidence: f32) -> Self {
        Self {
            text: text.into(),
            bounding_box,
            confidence,
        }
    }
}
