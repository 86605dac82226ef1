//! Core types for background removal results

use crate::error::Result;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

// Use instant crate for cross-platform time compatibility
use instant::Instant;

/// Result of a background removal operation
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// The processed image with background removed
    pub image: RgbaImage,

    /// The alpha mask applied to the image
    pub mask: SegmentationMask,

    /// Original image dimensions (width, height)
    pub original_dimensions: (u32, u32),

    /// Per-stage timings
    pub timings: ProcessingTimings,
}

impl RemovalResult {
    #[must_use]
    pub fn new(
        image: RgbaImage,
        mask: SegmentationMask,
        original_dimensions: (u32, u32),
        timings: ProcessingTimings,
    ) -> Self {
        Self {
            image,
            mask,
            original_dimensions,
            timings,
        }
    }

    /// Save the result as PNG with alpha channel
    ///
    /// The format is always PNG regardless of the path's extension.
    ///
    /// # Errors
    /// - Encoding or write failure
    pub fn save_png<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let encode_start = Instant::now();
        crate::services::ImageIOService::save_png(&self.image, path)?;
        self.timings.image_encode_ms = Some(encode_start.elapsed().as_millis() as u64);
        Ok(())
    }
}

/// Grayscale alpha mask (0 = background, 255 = foreground)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Row-major mask values
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Fraction of pixels considered foreground (> 127)
    #[must_use]
    pub fn foreground_ratio(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let foreground = self.data.iter().filter(|&&v| v > 127).count();
        foreground as f32 / self.data.len() as f32
    }
}

/// Timing breakdown for a single conversion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Image loading and decoding
    pub image_decode_ms: u64,

    /// Resize, pad, normalize
    pub preprocessing_ms: u64,

    /// Model execution, including time spent waiting for the backend lock
    pub inference_ms: u64,

    /// Mask mapping and alpha compositing
    pub postprocessing_ms: u64,

    /// PNG encoding, once the result is saved
    pub image_encode_ms: Option<u64>,

    /// Decode through postprocessing
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Share of the total spent in inference
    #[must_use]
    pub fn inference_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.inference_ms as f64 / self.total_ms as f64
        }
    }
}
