//! Weapon Scan
//!
//! Operator console core for spotting weapons in camera feeds, video files
//! and still images with an object-detection model.
//!
//! # Architecture
//!
//! A stream is one worker thread running a `StreamController` over a
//! `FrameSource`. Every frame goes through the shared `DetectionAdapter`;
//! the first detection on a frame becomes a `DetectionEvent` with a log line
//! and a proof-of-detection thumbnail. Workers never touch presentation
//! state. They report through a `StreamSink`, and the presentation thread
//! folds the resulting `ConsoleEvent`s into `ConsoleState`.
//!
//! # Module Structure
//!
//! - `ingest`: Frame sources (video files, cameras, still images)
//! - `detect`: Detection adapters, results, registry
//! - `controller`: Per-stream loop and its state machine
//! - `single_shot`: One-off detection on a still image
//! - `feed`: Background workers and the stop-all command
//! - `event`, `report`, `thumbnail`: What a detection produces downstream
//! - `presentation`, `log_book`: Presentation-thread state
//! - `config`: Console configuration (file + environment)

pub mod cancel;
pub mod config;
pub mod controller;
pub mod detect;
pub mod error;
pub mod event;
pub mod feed;
pub mod frame;
pub mod ingest;
pub mod log_book;
pub mod presentation;
pub mod report;
pub mod single_shot;
pub mod thumbnail;

pub use cancel::StopSignal;
pub use config::{BackendKind, ConsoleConfig, ModelSettings};
pub use controller::{StreamController, StreamReport, StreamSettings, StreamState};
pub use detect::{
    infer_shared, share, AdapterRegistry, BoundingBox, Detection, DetectionAdapter,
    InferenceResult, ObjectClass, ScriptStep, ScriptedAdapter, SharedAdapter, StubAdapter,
};
#[cfg(feature = "backend-tract")]
pub use detect::TractAdapter;
pub use error::{FrameSizeError, InferenceError, IngestError, ThumbnailError};
pub use event::{ChannelSink, ConsoleEvent, DetectionEvent, LogEntry, StatusUpdate, StreamSink};
pub use feed::{FeedHandle, FeedManager};
pub use frame::Frame;
pub use ingest::{
    load_image, CameraConfig, CameraSource, FeedKind, FileConfig, FileSource, FrameSource,
    MediaDescriptor,
};
pub use log_book::LogBook;
pub use presentation::ConsoleState;
pub use report::DetectionReporter;
pub use single_shot::SingleShotDetector;
pub use thumbnail::{Thumbnail, ThumbnailRenderer};
