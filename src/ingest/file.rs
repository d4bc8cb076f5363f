//! Local video file frame source.
//!
//! This module provides `FileSource` for streaming frames out of a local video
//! file. The file source is responsible for:
//! - Refusing remote URLs (local paths and `stub://` clips only)
//! - Decoding video frames in-memory, in file order
//! - Reporting end of file as a normal end of stream
//!
//! Real files decode through FFmpeg (feature `ingest-file-ffmpeg`). Without that
//! feature, only synthetic `stub://` clips can be opened.

use std::path::Path;

use super::synthetic::{parse_stub, SyntheticClip};
use super::{FeedKind, FrameSource, SourceState};
use crate::error::IngestError;
use crate::frame::Frame;
#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;

/// Frames in a `stub://name` clip that does not give an explicit `#N` count.
pub const DEFAULT_STUB_CLIP_FRAMES: u64 = 50;

const SYNTHETIC_WIDTH: u32 = 320;
const SYNTHETIC_HEIGHT: u32 = 240;

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local file path (e.g., "/srv/footage/gate.mp4") or `stub://name#N`.
    pub path: String,
}

impl FileConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Local file frame source.
pub struct FileSource {
    config: FileConfig,
    state: SourceState,
    backend: Option<FileBackend>,
    stub_limit: Option<u64>,
    frames_read: u64,
}

enum FileBackend {
    Synthetic(SyntheticClip),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self, IngestError> {
        if !is_local_file_path(&config.path) {
            return Err(IngestError::Unsupported(format!(
                "file ingestion only supports local paths (got {})",
                config.path
            )));
        }
        let stub_limit = match parse_stub(&config.path)? {
            Some(limit) => Some(limit.unwrap_or(DEFAULT_STUB_CLIP_FRAMES)),
            None => None,
        };
        Ok(Self {
            config,
            state: SourceState::Pending,
            backend: None,
            stub_limit,
            frames_read: 0,
        })
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    fn open_backend(&self) -> Result<FileBackend, IngestError> {
        if let Some(limit) = self.stub_limit {
            log::info!("FileSource: opened {} (synthetic)", self.config.path);
            return Ok(FileBackend::Synthetic(SyntheticClip::new(
                Some(limit),
                SYNTHETIC_WIDTH,
                SYNTHETIC_HEIGHT,
            )));
        }

        if !Path::new(&self.config.path).is_file() {
            return Err(IngestError::open(
                &self.config.path,
                "file does not exist or is not readable",
            ));
        }

        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            let source = FfmpegFileSource::open(&self.config.path)?;
            log::info!("FileSource: opened {} (ffmpeg)", self.config.path);
            Ok(FileBackend::Ffmpeg(source))
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(IngestError::open(
                &self.config.path,
                "video decoding requires the ingest-file-ffmpeg feature",
            ))
        }
    }
}

impl FrameSource for FileSource {
    fn descriptor(&self) -> &str {
        &self.config.path
    }

    fn kind(&self) -> FeedKind {
        FeedKind::Video
    }

    fn open(&mut self) -> Result<(), IngestError> {
        if self.state != SourceState::Pending {
            return Ok(());
        }
        let backend = self.open_backend()?;
        self.backend = Some(backend);
        self.state = SourceState::Open;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, IngestError> {
        if self.state == SourceState::Closed {
            return Ok(None);
        }
        let Some(backend) = self.backend.as_mut() else {
            return Err(IngestError::read(&self.config.path, "file source not open"));
        };
        let frame = match backend {
            FileBackend::Synthetic(clip) => clip.next_frame()?,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame()?,
        };
        if frame.is_some() {
            self.frames_read += 1;
            self.state = SourceState::Streaming;
        }
        Ok(frame)
    }

    fn close(&mut self) {
        if self.state == SourceState::Closed {
            return;
        }
        if self.backend.take().is_some() {
            log::debug!(
                "FileSource: released {} after {} frames",
                self.config.path,
                self.frames_read
            );
        }
        self.state = SourceState::Closed;
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(super::synthetic::STUB_SCHEME) {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_remote_urls() {
        assert!(matches!(
            FileSource::new(FileConfig::new("rtsp://camera/stream")),
            Err(IngestError::Unsupported(_))
        ));
        assert!(FileSource::new(FileConfig::new("")).is_err());
    }

    #[test]
    fn stub_clip_streams_in_order_then_ends() -> anyhow::Result<()> {
        let mut source = FileSource::new(FileConfig::new("stub://range#3"))?;
        source.open()?;
        assert_eq!(source.state(), SourceState::Open);

        let indices: Vec<u64> = std::iter::from_fn(|| source.next_frame().ok().flatten())
            .map(|frame| frame.index())
            .collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(source.state(), SourceState::Streaming);
        assert_eq!(source.frames_read(), 3);
        Ok(())
    }

    #[test]
    fn closed_source_produces_nothing() -> anyhow::Result<()> {
        let mut source = FileSource::new(FileConfig::new("stub://range"))?;
        source.open()?;
        assert!(source.next_frame()?.is_some());
        source.close();
        source.close();
        assert_eq!(source.state(), SourceState::Closed);
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn missing_file_fails_to_open() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("missing.mp4");
        let mut source = FileSource::new(FileConfig::new(path.display().to_string()))?;
        assert!(matches!(source.open(), Err(IngestError::Open { .. })));
        Ok(())
    }
}
