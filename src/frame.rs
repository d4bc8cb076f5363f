//! Decoded frames.
//!
//! - `Frame`: one RGB8 image from a file, camera, or still image, tagged with
//!   its capture index and capture time.
//!
//! Frames are plain owned values. Detection adapters return an annotated copy
//! through `Frame::with_image`, which keeps the capture metadata of the
//! original so events can be traced back to the frame that produced them.

use chrono::{DateTime, Local};
use image::RgbImage;

use crate::error::FrameSizeError;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
    /// Position in the source, starting at 1. Still images use 1.
    index: u64,
    captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(image: RgbImage, index: u64) -> Self {
        Self {
            image,
            index,
            captured_at: Local::now(),
        }
    }

    /// Build a frame from tightly packed RGB24 bytes.
    pub fn from_rgb(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        index: u64,
    ) -> Result<Self, FrameSizeError> {
        let expected = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(3);
        let actual = pixels.len();
        if actual != expected {
            return Err(FrameSizeError {
                width,
                height,
                expected,
                actual,
            });
        }
        let image = RgbImage::from_raw(width, height, pixels).ok_or(FrameSizeError {
            width,
            height,
            expected,
            actual,
        })?;
        Ok(Self::new(image, index))
    }

    /// Replace the pixels while keeping index and capture time.
    pub fn with_image(&self, image: RgbImage) -> Self {
        Self {
            image,
            index: self.index,
            captured_at: self.captured_at,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Zero width or zero height.
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
