//! Frame ingestion sources.
//!
//! This module provides the sources a stream can pull frames from:
//! - Local video files (`stub://` synthetic clips, FFmpeg with feature `ingest-file-ffmpeg`)
//! - Cameras by index (`stub://` synthetic feeds, V4L2 with feature `ingest-v4l2`)
//! - Still images for the single-shot path (`load_image`)
//!
//! Every streaming source implements `FrameSource`. The lifecycle is
//! `Pending -> Open -> Streaming -> Closed`; a closed source yields no more
//! frames. End of stream is `Ok(None)`, never an error.

pub mod camera;
pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod still;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
mod synthetic;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::IngestError;
use crate::frame::Frame;

pub use camera::{CameraConfig, CameraSource};
pub use file::{FileConfig, FileSource};
pub use still::load_image;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov"];

/// What kind of feed a source represents. Drives status wording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedKind {
    Video,
    Camera,
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedKind::Video => f.write_str("video"),
            FeedKind::Camera => f.write_str("webcam"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceState {
    Pending,
    Open,
    Streaming,
    Closed,
}

/// Sequential frame supplier.
pub trait FrameSource {
    /// Human-readable name used in logs and error messages.
    fn descriptor(&self) -> &str;

    fn kind(&self) -> FeedKind;

    /// Acquire the underlying file or device.
    fn open(&mut self) -> Result<(), IngestError>;

    /// Next frame in capture order, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, IngestError>;

    /// Release the underlying file or device. Idempotent.
    fn close(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn descriptor(&self) -> &str {
        (**self).descriptor()
    }

    fn kind(&self) -> FeedKind {
        (**self).kind()
    }

    fn open(&mut self) -> Result<(), IngestError> {
        (**self).open()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, IngestError> {
        (**self).next_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// A resolved user selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaDescriptor {
    Image(PathBuf),
    Video(PathBuf),
    Camera(u32),
}

impl MediaDescriptor {
    /// Route a selection by extension, or treat a bare integer as a camera index.
    pub fn classify(input: &str) -> Result<Self, IngestError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(IngestError::Unsupported("empty selection".to_string()));
        }
        if let Ok(index) = trimmed.parse::<u32>() {
            return Ok(MediaDescriptor::Camera(index));
        }

        let path = Path::new(trimmed);
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Ok(MediaDescriptor::Image(path.to_path_buf()))
        } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            Ok(MediaDescriptor::Video(path.to_path_buf()))
        } else {
            Err(IngestError::Unsupported(format!(
                "{} (expected .jpg/.jpeg/.png, .mp4/.avi/.mkv/.mov, or a camera index)",
                trimmed
            )))
        }
    }
}
