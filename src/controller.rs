//! Per-stream processing loop.
//!
//! `StreamController::run` drives one `FrameSource` until the stop signal is
//! set, the source ends, or something fails:
//!
//! ```text
//! Idle -> Active -> Stopped | Completed | Error
//! ```
//!
//! For every frame it runs inference, emits the annotated frame and a status
//! update, and, for the first detection only, a `DetectionEvent` followed by
//! the log line and thumbnail. The source is closed exactly once however the
//! loop ends.

use std::fmt;
use std::thread;
use std::time::Duration;

use crate::cancel::StopSignal;
use crate::detect::{infer_shared, SharedAdapter};
use crate::event::{LogEntry, StatusUpdate, StreamSink};
use crate::ingest::{FeedKind, FrameSource};
use crate::report::DetectionReporter;

/// Pause between frames so one stream does not monopolise the model.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamState {
    Idle,
    Active,
    Stopped,
    Completed,
    Error,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Stopped | StreamState::Completed | StreamState::Error)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamState::Idle => "idle",
            StreamState::Active => "active",
            StreamState::Stopped => "stopped",
            StreamState::Completed => "completed",
            StreamState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Outcome of one `StreamController::run`.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamReport {
    pub state: StreamState,
    pub frames_processed: u64,
    pub detections: u64,
    /// Failure cause when `state` is `Error`.
    pub error: Option<String>,
}

#[derive(Clone, Debug)]
pub struct StreamSettings {
    pub frame_interval: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }
}

pub struct StreamController {
    adapter: SharedAdapter,
    settings: StreamSettings,
    reporter: DetectionReporter,
    state: StreamState,
}

/// Closes the source when dropped, so every exit path closes it once.
struct OpenSource<S: FrameSource> {
    source: S,
}

impl<S: FrameSource> Drop for OpenSource<S> {
    fn drop(&mut self) {
        self.source.close();
    }
}

impl StreamController {
    pub fn new(adapter: SharedAdapter) -> Self {
        Self {
            adapter,
            settings: StreamSettings::default(),
            reporter: DetectionReporter::default(),
            state: StreamState::Idle,
        }
    }

    pub fn with_settings(mut self, settings: StreamSettings) -> Self {
        self.settings = settings;
        self
    }

    /// State of the most recent run; `Idle` before the first.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Process `source` until stopped, exhausted, or failed.
    ///
    /// `stop` is only read. A signal set before the call ends the run before
    /// the first frame is pulled.
    pub fn run<S: FrameSource>(
        &mut self,
        source: S,
        stop: &StopSignal,
        sink: &mut dyn StreamSink,
    ) -> StreamReport {
        let kind = source.kind();
        let text = FeedText::for_kind(kind);
        let descriptor = source.descriptor().to_string();
        let mut report = StreamReport {
            state: StreamState::Active,
            frames_processed: 0,
            detections: 0,
            error: None,
        };

        self.state = StreamState::Active;
        log::info!("{} stream starting: {}", kind, descriptor);
        sink.on_state(StreamState::Active, StatusUpdate::new(text.active.0, text.active.1));
        sink.on_log(LogEntry::new(text.starting(&descriptor)));

        let mut guard = OpenSource { source };
        if let Err(err) = guard.source.open() {
            log::error!("{} stream failed to open {}: {}", kind, descriptor, err);
            sink.on_log(LogEntry::new(format!("ERROR: {} ({})", text.open_failed, err)));
            return self.finish(
                report,
                StreamState::Error,
                Some(err.to_string()),
                StatusUpdate::new("ERROR", text.open_failed),
                None,
                sink,
            );
        }
        sink.on_log(LogEntry::new(text.online));

        loop {
            if stop.is_set() {
                log::info!("{} stream stop requested after {} frames", kind, report.frames_processed);
                return self.finish(
                    report,
                    StreamState::Stopped,
                    None,
                    StatusUpdate::new(text.stopped.0, text.stopped.1),
                    Some(text.stopped_log),
                    sink,
                );
            }

            let frame = match guard.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("{} stream exhausted after {} frames", kind, report.frames_processed);
                    return self.finish(
                        report,
                        StreamState::Completed,
                        None,
                        StatusUpdate::new(text.completed.0, text.completed.1),
                        Some(text.completed_log),
                        sink,
                    );
                }
                Err(err) => {
                    log::error!("{} stream read failed: {}", kind, err);
                    sink.on_log(LogEntry::new(format!("ERROR: frame read failed -> {err}")));
                    return self.finish(
                        report,
                        StreamState::Error,
                        Some(err.to_string()),
                        StatusUpdate::new("ERROR", "Frame read failed."),
                        None,
                        sink,
                    );
                }
            };

            let result = match infer_shared(&self.adapter, &frame) {
                Ok(result) => result,
                Err(err) => {
                    log::error!("{} stream inference failed on frame {}: {}", kind, frame.index(), err);
                    sink.on_log(LogEntry::new(format!("{} -> {err}", text.inference_failed)));
                    return self.finish(
                        report,
                        StreamState::Error,
                        Some(err.to_string()),
                        StatusUpdate::new("ERROR", "Model inference failed."),
                        None,
                        sink,
                    );
                }
            };
            report.frames_processed += 1;

            sink.on_frame(&result.annotated);
            match result.primary() {
                Some(detection) => {
                    let detection = detection.clone();
                    log::debug!(
                        "{} frame {}: {} at {:.2}%",
                        kind,
                        frame.index(),
                        detection.class_name(),
                        detection.confidence
                    );
                    sink.on_status(StatusUpdate::detected(&detection));
                    let message = format!(
                        "{} detected: {} ({:.2}%)",
                        text.log_subject,
                        detection.class_name(),
                        detection.confidence
                    );
                    self.reporter
                        .report(sink, &detection, result.annotated, Some(kind), message);
                    report.detections += 1;
                }
                None => sink.on_status(StatusUpdate::new(text.scanning.0, text.scanning.1)),
            }

            if !self.settings.frame_interval.is_zero() {
                thread::sleep(self.settings.frame_interval);
            }
        }
    }

    fn finish(
        &mut self,
        mut report: StreamReport,
        state: StreamState,
        error: Option<String>,
        banner: StatusUpdate,
        log_line: Option<&str>,
        sink: &mut dyn StreamSink,
    ) -> StreamReport {
        self.state = state;
        report.state = state;
        report.error = error;
        sink.on_state(state, banner);
        if let Some(line) = log_line {
            sink.on_log(LogEntry::new(line));
        }
        report
    }
}

/// Operator-facing wording for each feed kind.
struct FeedText {
    active: (&'static str, &'static str),
    scanning: (&'static str, &'static str),
    stopped: (&'static str, &'static str),
    completed: (&'static str, &'static str),
    stopped_log: &'static str,
    completed_log: &'static str,
    open_failed: &'static str,
    online: &'static str,
    inference_failed: &'static str,
    log_subject: &'static str,
    kind: FeedKind,
}

impl FeedText {
    fn for_kind(kind: FeedKind) -> Self {
        match kind {
            FeedKind::Video => Self {
                active: ("VIDEO SCAN ACTIVE", "Processing video frames..."),
                scanning: ("VIDEO SCAN ACTIVE", "Scanning frames..."),
                stopped: ("VIDEO STOPPED", "Feed stopped by user."),
                completed: ("VIDEO COMPLETED", "All frames processed."),
                stopped_log: "Video stopped by user.",
                completed_log: "Video processing finished.",
                open_failed: "Cannot open video file.",
                online: "Video detection started.",
                inference_failed: "Model inference error",
                log_subject: "Video",
                kind,
            },
            FeedKind::Camera => Self {
                active: ("LIVE MATRIX FEED", "Camera connected."),
                scanning: ("LIVE MATRIX FEED", "Scanning..."),
                stopped: ("FEED TERMINATED", "Connection closed."),
                completed: ("FEED TERMINATED", "Connection closed."),
                stopped_log: "Webcam stopped.",
                completed_log: "Webcam stopped.",
                open_failed: "Webcam not found.",
                online: "Webcam Online.",
                inference_failed: "Model inference error (webcam)",
                log_subject: "Webcam",
                kind,
            },
        }
    }

    fn starting(&self, descriptor: &str) -> String {
        match self.kind {
            FeedKind::Video => format!("Video selected: {descriptor}"),
            FeedKind::Camera => "Starting webcam...".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{
        share, BoundingBox, Detection, DetectionAdapter, InferenceResult, ScriptStep, ScriptedAdapter,
        StubAdapter,
    };
    use crate::error::{InferenceError, IngestError};
    use crate::event::ConsoleEvent;
    use crate::frame::Frame;
    use image::RgbImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counters {
        opens: AtomicUsize,
        reads: AtomicUsize,
        closes: AtomicUsize,
    }

    /// In-memory source: `frames` frames, optionally failing to open or read.
    struct FakeSource {
        kind: FeedKind,
        frames: Option<u64>,
        fail_open: bool,
        fail_read_at: Option<u64>,
        produced: u64,
        counters: Arc<Counters>,
    }

    impl FakeSource {
        fn video(frames: Option<u64>, counters: &Arc<Counters>) -> Self {
            Self {
                kind: FeedKind::Video,
                frames,
                fail_open: false,
                fail_read_at: None,
                produced: 0,
                counters: Arc::clone(counters),
            }
        }
    }

    impl FrameSource for FakeSource {
        fn descriptor(&self) -> &str {
            "fake://clip"
        }

        fn kind(&self) -> FeedKind {
            self.kind
        }

        fn open(&mut self) -> Result<(), IngestError> {
            self.counters.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail_open {
                return Err(IngestError::open("fake://clip", "no such device"));
            }
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<Frame>, IngestError> {
            self.counters.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_read_at == Some(self.produced + 1) {
                return Err(IngestError::read("fake://clip", "corrupt packet"));
            }
            if self.frames.is_some_and(|n| self.produced >= n) {
                return Ok(None);
            }
            self.produced += 1;
            Ok(Some(Frame::new(RgbImage::new(16, 12), self.produced)))
        }

        fn close(&mut self) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_controller(adapter: SharedAdapter) -> StreamController {
        StreamController::new(adapter).with_settings(StreamSettings {
            frame_interval: Duration::ZERO,
        })
    }

    fn count(events: &[ConsoleEvent], pred: impl Fn(&ConsoleEvent) -> bool) -> usize {
        events.iter().filter(|e| pred(e)).count()
    }

    fn pistol() -> Detection {
        Detection::new(3, 91.2, BoundingBox { x: 2.0, y: 2.0, w: 6.0, h: 6.0 })
    }

    #[test]
    fn exhausted_source_completes_and_closes_once() {
        let counters = Arc::new(Counters::default());
        let mut controller = fast_controller(share(StubAdapter::new()));
        let mut sink: Vec<ConsoleEvent> = Vec::new();

        let report = controller.run(FakeSource::video(Some(3), &counters), &StopSignal::new(), &mut sink);

        assert_eq!(report.state, StreamState::Completed);
        assert_eq!(report.frames_processed, 3);
        assert_eq!(report.detections, 0);
        assert_eq!(controller.state(), StreamState::Completed);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(count(&sink, |e| matches!(e, ConsoleEvent::Status(_))), 3);
        assert_eq!(count(&sink, |e| matches!(e, ConsoleEvent::Frame(_))), 3);
        assert_eq!(count(&sink, |e| matches!(e, ConsoleEvent::Detection(_))), 0);
        match sink.last() {
            Some(ConsoleEvent::Log(entry)) => assert_eq!(entry.message(), "Video processing finished."),
            other => panic!("unexpected last event {:?}", other),
        }
    }

    #[test]
    fn per_frame_callbacks_keep_order() {
        let counters = Arc::new(Counters::default());
        let adapter = share(ScriptedAdapter::new(vec![ScriptStep::Detect(vec![pistol()])]));
        let mut controller = fast_controller(adapter);
        let mut sink: Vec<ConsoleEvent> = Vec::new();

        controller.run(FakeSource::video(Some(1), &counters), &StopSignal::new(), &mut sink);

        let kinds: Vec<&'static str> = sink
            .iter()
            .map(|e| match e {
                ConsoleEvent::State { .. } => "state",
                ConsoleEvent::Status(_) => "status",
                ConsoleEvent::Frame(_) => "frame",
                ConsoleEvent::Detection(_) => "detection",
                ConsoleEvent::Log(_) => "log",
                ConsoleEvent::Finished { .. } => "finished",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "state", "log", "log", // active, selected, started
                "frame", "status", "detection", "log", "log", // detected + thumbnail
                "state", "log", // completed
            ]
        );
        assert!(matches!(&sink[4], ConsoleEvent::Status(s) if s.status == "Pistol DETECTED"));
        assert!(matches!(&sink[6], ConsoleEvent::Log(l) if l.message() == "Video detected: Pistol (91.20%)"));
    }

    #[test]
    fn only_first_detection_is_reported() {
        let counters = Arc::new(Counters::default());
        let knife = Detection::new(1, 99.0, BoundingBox::default());
        let adapter = share(ScriptedAdapter::new(vec![ScriptStep::Detect(vec![pistol(), knife])]));
        let mut sink: Vec<ConsoleEvent> = Vec::new();

        let report =
            fast_controller(adapter).run(FakeSource::video(Some(1), &counters), &StopSignal::new(), &mut sink);

        assert_eq!(report.detections, 1);
        let detections: Vec<_> = sink
            .iter()
            .filter_map(|e| match e {
                ConsoleEvent::Detection(d) => Some(d.class_name().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(detections, vec!["Pistol".to_string()]);
    }

    #[test]
    fn stop_before_start_is_honoured() {
        let counters = Arc::new(Counters::default());
        let stop = StopSignal::new();
        stop.set();
        let mut sink: Vec<ConsoleEvent> = Vec::new();

        let report = fast_controller(share(StubAdapter::new())).run(
            FakeSource::video(None, &counters),
            &stop,
            &mut sink,
        );

        assert_eq!(report.state, StreamState::Stopped);
        assert_eq!(report.frames_processed, 0);
        assert_eq!(counters.reads.load(Ordering::SeqCst), 0);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert!(sink.iter().any(|e| matches!(
            e,
            ConsoleEvent::State { state: StreamState::Stopped, update } if update.status == "VIDEO STOPPED"
        )));
    }

    #[test]
    fn open_failure_never_reads() {
        let counters = Arc::new(Counters::default());
        let mut source = FakeSource::video(Some(5), &counters);
        source.fail_open = true;
        let mut sink: Vec<ConsoleEvent> = Vec::new();

        let report = fast_controller(share(StubAdapter::new())).run(source, &StopSignal::new(), &mut sink);

        assert_eq!(report.state, StreamState::Error);
        assert!(report.error.as_deref().unwrap_or_default().contains("no such device"));
        assert_eq!(counters.reads.load(Ordering::SeqCst), 0);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert!(sink.iter().any(|e| matches!(
            e,
            ConsoleEvent::State { state: StreamState::Error, update } if update.detail == "Cannot open video file."
        )));
    }

    #[test]
    fn inference_failure_ends_stream_without_retry() {
        let counters = Arc::new(Counters::default());
        let adapter = share(ScriptedAdapter::new(vec![
            ScriptStep::Detect(Vec::new()),
            ScriptStep::Fail("tensor shape mismatch".to_string()),
        ]));
        let mut sink: Vec<ConsoleEvent> = Vec::new();

        let report =
            fast_controller(adapter).run(FakeSource::video(Some(10), &counters), &StopSignal::new(), &mut sink);

        assert_eq!(report.state, StreamState::Error);
        assert_eq!(report.frames_processed, 1);
        assert_eq!(counters.reads.load(Ordering::SeqCst), 2);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert!(sink.iter().any(|e| matches!(
            e,
            ConsoleEvent::Log(l) if l.message().starts_with("Model inference error -> ")
        )));
    }

    #[test]
    fn read_failure_is_an_error() {
        let counters = Arc::new(Counters::default());
        let mut source = FakeSource::video(Some(10), &counters);
        source.fail_read_at = Some(3);
        let mut sink: Vec<ConsoleEvent> = Vec::new();

        let report = fast_controller(share(StubAdapter::new())).run(source, &StopSignal::new(), &mut sink);

        assert_eq!(report.state, StreamState::Error);
        assert_eq!(report.frames_processed, 2);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn camera_uses_feed_wording() {
        let counters = Arc::new(Counters::default());
        let mut source = FakeSource::video(Some(1), &counters);
        source.kind = FeedKind::Camera;
        let mut sink: Vec<ConsoleEvent> = Vec::new();

        fast_controller(share(StubAdapter::new())).run(source, &StopSignal::new(), &mut sink);

        let logs: Vec<&str> = sink
            .iter()
            .filter_map(|e| match e {
                ConsoleEvent::Log(l) => Some(l.message()),
                _ => None,
            })
            .collect();
        assert_eq!(logs, vec!["Starting webcam...", "Webcam Online.", "Webcam stopped."]);
        assert!(matches!(&sink[0], ConsoleEvent::State { update, .. } if update.status == "LIVE MATRIX FEED"));
        assert!(matches!(
            sink.iter().rev().nth(1),
            Some(ConsoleEvent::State { state: StreamState::Completed, update }) if update.status == "FEED TERMINATED"
        ));
    }

    /// Reports a pistol on every frame; the first annotated frame comes back empty.
    struct BlankFirstAdapter {
        calls: u64,
    }

    impl DetectionAdapter for BlankFirstAdapter {
        fn name(&self) -> &'static str {
            "blank-first"
        }

        fn infer(&mut self, frame: &Frame) -> Result<InferenceResult, InferenceError> {
            self.calls += 1;
            let annotated = if self.calls == 1 {
                frame.with_image(RgbImage::new(0, 0))
            } else {
                frame.clone()
            };
            Ok(InferenceResult {
                detections: vec![pistol()],
                annotated,
            })
        }
    }

    #[test]
    fn thumbnail_failure_mid_stream_keeps_scanning() {
        let counters = Arc::new(Counters::default());
        let adapter = share(BlankFirstAdapter { calls: 0 });
        let mut sink: Vec<ConsoleEvent> = Vec::new();

        let report =
            fast_controller(adapter).run(FakeSource::video(Some(2), &counters), &StopSignal::new(), &mut sink);

        assert_eq!(report.state, StreamState::Completed);
        assert_eq!(report.frames_processed, 2);
        assert_eq!(report.detections, 2);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);

        let failures: Vec<&str> = sink
            .iter()
            .filter_map(|e| match e {
                ConsoleEvent::Log(l) if l.message().starts_with("ERROR thumbnail -> ") => Some(l.message()),
                _ => None,
            })
            .collect();
        assert_eq!(failures.len(), 1);
        let thumbnails = count(&sink, |e| {
            matches!(e, ConsoleEvent::Log(l) if l.thumbnail_image().is_some())
        });
        assert_eq!(thumbnails, 1);
    }

    #[test]
    fn terminal_states() {
        assert!(!StreamState::Idle.is_terminal());
        assert!(!StreamState::Active.is_terminal());
        assert!(StreamState::Stopped.is_terminal());
        assert!(StreamState::Completed.is_terminal());
        assert!(StreamState::Error.is_terminal());
    }
}
