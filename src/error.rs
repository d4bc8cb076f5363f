//! Error types for the detection pipeline.

use thiserror::Error;

/// Frame source failures.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Device or file could not be acquired (camera not found, file unreadable).
    #[error("cannot open {descriptor}: {reason}")]
    Open { descriptor: String, reason: String },

    /// A frame could not be read from an already open source.
    #[error("frame read failed on {descriptor}: {reason}")]
    Read { descriptor: String, reason: String },

    /// The selection is neither a supported image, video, nor camera index.
    #[error("unsupported media: {0}")]
    Unsupported(String),

    #[error(transparent)]
    FrameSize(#[from] FrameSizeError),
}

impl IngestError {
    pub fn open(descriptor: impl Into<String>, reason: impl ToString) -> Self {
        Self::Open {
            descriptor: descriptor.into(),
            reason: reason.to_string(),
        }
    }

    pub fn read(descriptor: impl Into<String>, reason: impl ToString) -> Self {
        Self::Read {
            descriptor: descriptor.into(),
            reason: reason.to_string(),
        }
    }
}

/// Detection adapter failures. Fatal to the stream that hit them.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("model inference failed: {0}")]
    Model(String),

    #[error("frame rejected by model: {0}")]
    InvalidFrame(String),

    #[error("detection adapter lock poisoned")]
    Poisoned,
}

/// Thumbnail rendering failures. Logged and skipped, never fatal.
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("cannot render thumbnail of an empty {width}x{height} frame")]
    EmptyFrame { width: u32, height: u32 },
}

/// Pixel buffer does not match the declared frame dimensions.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("RGB frame length mismatch for {width}x{height}: expected {expected} bytes, got {actual}")]
pub struct FrameSizeError {
    pub width: u32,
    pub height: u32,
    pub expected: usize,
    pub actual: usize,
}
