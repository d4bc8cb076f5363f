//! Camera frame source.
//!
//! This module provides `CameraSource` for live capture from a camera index.
//! Index `N` maps to the V4L2 node `/dev/videoN` unless a device path is given.
//!
//! The camera source is responsible for:
//! - Opening the device (a missing camera is an open error, not a panic)
//! - Capturing frames in-memory and normalising them to RGB
//! - Releasing the device on close, on every exit path
//!
//! Real devices capture through libv4l (feature `ingest-v4l2`). `stub://`
//! devices are synthetic and unbounded unless they carry a `#N` frame count.

#[cfg(feature = "ingest-v4l2")]
use ouroboros::self_referencing;

use super::synthetic::{parse_stub, SyntheticClip};
use super::{FeedKind, FrameSource, SourceState};
use crate::error::IngestError;
use crate::frame::Frame;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Camera index as presented to the user (0 = first camera).
    pub index: u32,
    /// Explicit device path; overrides the index when set (e.g. "stub://webcam").
    pub device: Option<String>,
    /// Target frame rate requested from the device.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            device: None,
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

impl CameraConfig {
    pub fn with_index(index: u32) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    pub fn with_device(device: impl Into<String>) -> Self {
        Self {
            device: Some(device.into()),
            ..Self::default()
        }
    }

    pub fn device_path(&self) -> String {
        self.device
            .clone()
            .unwrap_or_else(|| format!("/dev/video{}", self.index))
    }
}

/// Camera frame source.
pub struct CameraSource {
    config: CameraConfig,
    device_path: String,
    state: SourceState,
    backend: Option<CameraBackend>,
    frames_captured: u64,
}

enum CameraBackend {
    Synthetic(SyntheticClip),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Self {
        let device_path = config.device_path();
        Self {
            config,
            device_path,
            state: SourceState::Pending,
            backend: None,
            frames_captured: 0,
        }
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    fn open_backend(&self) -> Result<CameraBackend, IngestError> {
        if let Some(limit) = parse_stub(&self.device_path)? {
            log::info!("CameraSource: connected to {} (synthetic)", self.device_path);
            return Ok(CameraBackend::Synthetic(SyntheticClip::new(
                limit,
                self.config.width,
                self.config.height,
            )));
        }

        #[cfg(feature = "ingest-v4l2")]
        {
            Ok(CameraBackend::Device(DeviceCamera::open(
                &self.config,
                &self.device_path,
            )?))
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(IngestError::open(
                &self.device_path,
                "camera capture requires the ingest-v4l2 feature",
            ))
        }
    }
}

impl FrameSource for CameraSource {
    fn descriptor(&self) -> &str {
        &self.device_path
    }

    fn kind(&self) -> FeedKind {
        FeedKind::Camera
    }

    fn open(&mut self) -> Result<(), IngestError> {
        if self.state != SourceState::Pending {
            return Ok(());
        }
        self.backend = Some(self.open_backend()?);
        self.state = SourceState::Open;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, IngestError> {
        if self.state == SourceState::Closed {
            return Ok(None);
        }
        let Some(backend) = self.backend.as_mut() else {
            return Err(IngestError::read(&self.device_path, "camera not open"));
        };
        let frame = match backend {
            CameraBackend::Synthetic(clip) => clip.next_frame()?,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(device) => Some(device.next_frame(&self.device_path)?),
        };
        if frame.is_some() {
            self.frames_captured += 1;
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
                "CameraSource: released {} after {} frames",
                self.device_path,
                self.frames_captured
            );
        }
        self.state = SourceState::Closed;
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.close();
    }
}

// ----------------------------------------------------------------------------
// Production camera capture using libv4l
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
struct DeviceCamera {
    state: DeviceCameraState,
    format: super::normalize::PixelFormat,
    width: u32,
    height: u32,
    frame_count: u64,
}

#[cfg(feature = "ingest-v4l2")]
#[self_referencing]
struct DeviceCameraState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "ingest-v4l2")]
impl DeviceCamera {
    fn open(config: &CameraConfig, device_path: &str) -> Result<Self, IngestError> {
        use super::normalize::PixelFormat;
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(device_path)
            .map_err(|err| IngestError::open(device_path, format!("camera not found: {err}")))?;
        let mut format = device
            .format()
            .map_err(|err| IngestError::open(device_path, format!("read format: {err}")))?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("CameraSource: failed to set format on {}: {}", device_path, err);
                device
                    .format()
                    .map_err(|err| IngestError::open(device_path, format!("read format: {err}")))?
            }
        };

        if config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("CameraSource: failed to set fps on {}: {}", device_path, err);
            }
        }

        let pixel_format = match &format.fourcc.repr {
            b"RGB3" => PixelFormat::Rgb24,
            b"YUYV" => PixelFormat::Yuyv,
            b"NV12" => PixelFormat::Nv12,
            other => {
                return Err(IngestError::open(
                    device_path,
                    format!("unsupported pixel format {}", String::from_utf8_lossy(other)),
                ))
            }
        };

        let state = DeviceCameraStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
            },
        }
        .try_build()
        .map_err(|err| IngestError::open(device_path, format!("create buffer stream: {err}")))?;

        log::info!(
            "CameraSource: connected to {} ({}x{} {})",
            device_path,
            format.width,
            format.height,
            format.fourcc
        );
        Ok(Self {
            state,
            format: pixel_format,
            width: format.width,
            height: format.height,
            frame_count: 0,
        })
    }

    fn next_frame(&mut self, device_path: &str) -> Result<Frame, IngestError> {
        use v4l::io::traits::CaptureStream;

        let (width, height, format) = (self.width, self.height, self.format);
        let pixels = self
            .state
            .with_mut(|fields| {
                let (buf, _meta) = fields.stream.next()?;
                Ok::<_, std::io::Error>(buf.to_vec())
            })
            .map_err(|err| IngestError::read(device_path, format!("capture frame: {err}")))?;
        let rgb = super::normalize::normalize_to_rgb(&pixels, width, height, format)
            .map_err(|err| IngestError::read(device_path, err))?;

        self.frame_count += 1;
        Ok(Frame::from_rgb(rgb, width, height, self.frame_count)?)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
