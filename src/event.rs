//! Events emitted by the detection pipeline.
//!
//! Workers never touch presentation state. They report through a
//! `StreamSink`; `ChannelSink` forwards everything as `ConsoleEvent`s to the
//! presentation thread, which is the only consumer.

use std::fmt;

use chrono::{DateTime, Local};
use crossbeam_channel::Sender;
use rand::seq::SliceRandom;

use crate::controller::{StreamReport, StreamState};
use crate::detect::Detection;
use crate::frame::Frame;
use crate::ingest::FeedKind;
use crate::thumbnail::Thumbnail;

/// Flavour tags for log lines. Carry no meaning.
pub const PREFIX_TAGS: [&str; 5] = ["[MATRIX]", "[CORE]", "[NODE-01]", "[SYS]", "[SCAN]"];

// ----------------------------------------------------------------------------
// Status
// ----------------------------------------------------------------------------

/// Headline + detail shown in the status bar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: String,
    pub detail: String,
}

impl StatusUpdate {
    pub fn new(status: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            detail: detail.into(),
        }
    }

    /// Status for a frame with a primary detection.
    pub fn detected(detection: &Detection) -> Self {
        Self::new(
            format!("{} DETECTED", detection.class_name()),
            format!("CONFIDENCE: {:.2}%", detection.confidence),
        )
    }
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "STATUS: {} | {}", self.status, self.detail)
    }
}

// ----------------------------------------------------------------------------
// Detection events
// ----------------------------------------------------------------------------

/// Immutable record of one primary detection.
#[derive(Clone, Debug)]
pub struct DetectionEvent {
    timestamp: DateTime<Local>,
    class_name: String,
    confidence_percent: f32,
    feed: Option<FeedKind>,
    rendered_frame: Frame,
}

impl DetectionEvent {
    pub fn new(detection: &Detection, rendered_frame: Frame, feed: Option<FeedKind>) -> Self {
        Self {
            timestamp: Local::now(),
            class_name: detection.class_name().to_string(),
            confidence_percent: detection.confidence,
            feed,
            rendered_frame,
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn confidence_percent(&self) -> f32 {
        self.confidence_percent
    }

    /// Feed that produced the event; `None` for single-image scans.
    pub fn feed(&self) -> Option<FeedKind> {
        self.feed
    }

    pub fn rendered_frame(&self) -> &Frame {
        &self.rendered_frame
    }

    /// Thumbnail caption, e.g. `14:02:11 — Pistol`.
    pub fn label(&self) -> String {
        format!("{} — {}", self.timestamp.format("%H:%M:%S"), self.class_name)
    }
}

// ----------------------------------------------------------------------------
// Log entries
// ----------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct LogEntry {
    prefix_tag: &'static str,
    message: String,
    thumbnail: Option<Thumbnail>,
}

impl LogEntry {
    pub fn new(message: impl Into<String>) -> Self {
        let prefix_tag = PREFIX_TAGS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(PREFIX_TAGS[0]);
        Self::with_prefix(prefix_tag, message)
    }

    pub fn with_prefix(prefix_tag: &'static str, message: impl Into<String>) -> Self {
        Self {
            prefix_tag,
            message: message.into(),
            thumbnail: None,
        }
    }

    /// Log line carrying a proof-of-detection thumbnail; the message is its caption.
    pub fn thumbnail(thumbnail: Thumbnail) -> Self {
        let mut entry = Self::new(thumbnail.label());
        entry.thumbnail = Some(thumbnail);
        entry
    }

    pub fn prefix_tag(&self) -> &'static str {
        self.prefix_tag
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn thumbnail_image(&self) -> Option<&Thumbnail> {
        self.thumbnail.as_ref()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.prefix_tag, self.message)
    }
}

// ----------------------------------------------------------------------------
// Sinks
// ----------------------------------------------------------------------------

/// Everything a worker can tell the presentation thread.
#[derive(Clone, Debug)]
pub enum ConsoleEvent {
    State { state: StreamState, update: StatusUpdate },
    Status(StatusUpdate),
    Frame(Frame),
    Detection(DetectionEvent),
    Log(LogEntry),
    Finished { feed_id: u64, report: StreamReport },
}

/// Receiver of pipeline output.
///
/// Calls for one frame arrive in the order frame, status, detection, log.
/// Lifecycle banners (scan active, stopped, completed, error) arrive through
/// `on_state`, so `on_status` fires exactly once per processed frame.
pub trait StreamSink {
    fn on_state(&mut self, state: StreamState, update: StatusUpdate);

    fn on_status(&mut self, update: StatusUpdate);

    /// Annotated frame for the preview panel.
    fn on_frame(&mut self, _frame: &Frame) {}

    fn on_detection(&mut self, event: &DetectionEvent);

    fn on_log(&mut self, entry: LogEntry);
}

/// Collects events in memory. Used by tests and synchronous callers.
impl StreamSink for Vec<ConsoleEvent> {
    fn on_state(&mut self, state: StreamState, update: StatusUpdate) {
        self.push(ConsoleEvent::State { state, update });
    }

    fn on_status(&mut self, update: StatusUpdate) {
        self.push(ConsoleEvent::Status(update));
    }

    fn on_frame(&mut self, frame: &Frame) {
        self.push(ConsoleEvent::Frame(frame.clone()));
    }

    fn on_detection(&mut self, event: &DetectionEvent) {
        self.push(ConsoleEvent::Detection(event.clone()));
    }

    fn on_log(&mut self, entry: LogEntry) {
        self.push(ConsoleEvent::Log(entry));
    }
}

/// Forwards events to the presentation thread.
///
/// A closed channel means the presentation side is gone; events are dropped.
#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<ConsoleEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<ConsoleEvent>) -> Self {
        Self { tx }
    }

    pub fn send(&self, event: ConsoleEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("presentation channel closed; dropping event");
        }
    }
}

impl StreamSink for ChannelSink {
    fn on_state(&mut self, state: StreamState, update: StatusUpdate) {
        self.send(ConsoleEvent::State { state, update });
    }

    fn on_status(&mut self, update: StatusUpdate) {
        self.send(ConsoleEvent::Status(update));
    }

    fn on_frame(&mut self, frame: &Frame) {
        self.send(ConsoleEvent::Frame(frame.clone()));
    }

    fn on_detection(&mut self, event: &DetectionEvent) {
        self.send(ConsoleEvent::Detection(event.clone()));
    }

    fn on_log(&mut self, entry: LogEntry) {
        self.send(ConsoleEvent::Log(entry));
    }
}
