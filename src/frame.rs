//! Decoded video frames.
//!
//! - `Frame`: one RGB24 image handed from an ingestion source to the frame processor.
//!
//! Frames are borrowed by the processor for exactly one iteration of the loop and
//! are never buffered beyond it.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

/// Bytes per RGB24 pixel.
pub const RGB_CHANNELS: usize = 3;

// ----------------------------------------------------------------------------
// Frame: decoded RGB image
// ----------------------------------------------------------------------------

/// One decoded frame. Pixels are row-major RGB24 with no row padding.
pub struct Frame {
    /// Private pixel data. Read access goes through `pixels()`.
    data: Vec<u8>,

    /// 1-based sequence number assigned by the source.
    pub sequence: u64,

    pub width: u32,
    pub height: u32,

    /// Monotonic capture instant.
    captured_at: Instant,
}

impl Frame {
    /// Create a frame, validating the buffer length against the dimensions.
    pub fn new(sequence: u64, data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            sequence,
            width,
            height,
            captured_at: Instant::now(),
        })
    }

    /// Read-only view of the RGB24 pixels.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Time since capture.
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    /// RGB triple at (`col`, `row`), if inside the frame.
    pub fn pixel(&self, col: u32, row: u32) -> Option<[u8; 3]> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let offset = (row as usize * self.width as usize + col as usize) * RGB_CHANNELS;
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ])
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.sequence)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Expected RGB24 buffer length for the given dimensions.
pub fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
        .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
