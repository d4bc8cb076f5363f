use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use weapon_scan::{
    load_image, share, BoundingBox, CameraConfig, CameraSource, ConsoleEvent, Detection,
    DetectionEvent, FeedKind, FileConfig, FileSource, Frame, FrameSource, IngestError, LogEntry,
    ObjectClass, ScriptStep, ScriptedAdapter, SingleShotDetector, StatusUpdate, StopSignal,
    StreamController, StreamSettings, StreamSink, StreamState, StubAdapter,
};

/// Wraps a source and counts lifecycle calls.
struct Counted<S> {
    inner: S,
    next_calls: Arc<AtomicUsize>,
    close_calls: Arc<AtomicUsize>,
}

impl<S: FrameSource> Counted<S> {
    fn new(inner: S) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let next_calls = Arc::new(AtomicUsize::new(0));
        let close_calls = Arc::new(AtomicUsize::new(0));
        let counted = Self {
            inner,
            next_calls: Arc::clone(&next_calls),
            close_calls: Arc::clone(&close_calls),
        };
        (counted, next_calls, close_calls)
    }
}

impl<S: FrameSource> FrameSource for Counted<S> {
    fn descriptor(&self) -> &str {
        self.inner.descriptor()
    }

    fn kind(&self) -> FeedKind {
        self.inner.kind()
    }

    fn open(&mut self) -> Result<(), IngestError> {
        self.inner.open()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, IngestError> {
        self.next_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.next_frame()
    }

    fn close(&mut self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.close();
    }
}

/// Counts callbacks; optionally sets a stop signal after N statuses.
#[derive(Default)]
struct Tally {
    statuses: usize,
    detections: Vec<String>,
    logs: Vec<String>,
    terminal: Option<StreamState>,
    stop_after: Option<(usize, StopSignal)>,
}

impl StreamSink for Tally {
    fn on_state(&mut self, state: StreamState, _update: StatusUpdate) {
        if state.is_terminal() {
            self.terminal = Some(state);
        }
    }

    fn on_status(&mut self, _update: StatusUpdate) {
        self.statuses += 1;
        if let Some((after, stop)) = &self.stop_after {
            if self.statuses == *after {
                stop.set();
            }
        }
    }

    fn on_detection(&mut self, event: &DetectionEvent) {
        self.detections.push(event.class_name().to_string());
    }

    fn on_log(&mut self, entry: LogEntry) {
        self.logs.push(entry.message().to_string());
    }
}

fn fast() -> StreamSettings {
    StreamSettings {
        frame_interval: Duration::ZERO,
    }
}

#[test]
fn three_empty_frames_complete_without_detections() -> anyhow::Result<()> {
    let (source, _, closes) = Counted::new(FileSource::new(FileConfig::new("stub://gate#3"))?);
    let mut controller = StreamController::new(share(StubAdapter::new())).with_settings(fast());
    let mut tally = Tally::default();

    let report = controller.run(source, &StopSignal::new(), &mut tally);

    assert_eq!(report.state, StreamState::Completed);
    assert_eq!(report.frames_processed, 3);
    assert_eq!(tally.statuses, 3);
    assert!(tally.detections.is_empty());
    assert_eq!(tally.terminal, Some(StreamState::Completed));
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn stop_after_second_frame_processes_exactly_two() {
    let (source, _, closes) = Counted::new(CameraSource::new(CameraConfig::with_device("stub://lobby")));
    let stop = StopSignal::new();
    let mut tally = Tally {
        stop_after: Some((2, stop.clone())),
        ..Tally::default()
    };
    let mut controller = StreamController::new(share(StubAdapter::new())).with_settings(fast());

    let report = controller.run(source, &stop, &mut tally);

    assert_eq!(report.state, StreamState::Stopped);
    assert_eq!(report.frames_processed, 2);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(tally.logs.last().map(String::as_str), Some("Webcam stopped."));
}

#[test]
fn stop_from_another_thread_is_prompt() {
    let (source, _, closes) = Counted::new(CameraSource::new(CameraConfig::with_device("stub://yard")));
    let stop = StopSignal::new();
    let remote = stop.clone();
    let interval = Duration::from_millis(10);

    let worker = std::thread::spawn(move || {
        let mut controller = StreamController::new(share(StubAdapter::new()))
            .with_settings(StreamSettings { frame_interval: interval });
        let mut events: Vec<ConsoleEvent> = Vec::new();
        controller.run(source, &stop, &mut events)
    });

    std::thread::sleep(Duration::from_millis(50));
    let requested = Instant::now();
    remote.set();
    let report = worker.join().expect("worker finished");

    assert_eq!(report.state, StreamState::Stopped);
    assert!(report.frames_processed > 0);
    assert!(requested.elapsed() < Duration::from_secs(2));
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn open_failure_never_pulls_a_frame() {
    let camera = CameraSource::new(CameraConfig::with_device("/dev/video-missing-42"));
    let (source, next_calls, closes) = Counted::new(camera);
    let mut tally = Tally::default();

    let report = StreamController::new(share(StubAdapter::new()))
        .with_settings(fast())
        .run(source, &StopSignal::new(), &mut tally);

    assert_eq!(report.state, StreamState::Error);
    assert!(report.error.is_some());
    assert_eq!(next_calls.load(Ordering::SeqCst), 0);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(tally.statuses, 0);
    assert!(tally.logs.iter().any(|line| line.starts_with("ERROR: Webcam not found.")));
}

#[test]
fn primary_detection_is_first_not_most_confident() -> anyhow::Result<()> {
    let low_first = vec![
        Detection::new(1, 40.0, BoundingBox::default()),
        Detection::new(4, 99.0, BoundingBox::default()),
    ];
    let adapter = share(ScriptedAdapter::new(vec![ScriptStep::Detect(low_first)]));
    let source = FileSource::new(FileConfig::new("stub://gate#1"))?;
    let mut tally = Tally::default();

    let report = StreamController::new(adapter)
        .with_settings(fast())
        .run(source, &StopSignal::new(), &mut tally);

    assert_eq!(report.detections, 1);
    assert_eq!(tally.detections, vec!["Knife".to_string()]);
    assert!(tally.logs.contains(&"Video detected: Knife (40.00%)".to_string()));
    Ok(())
}

#[test]
fn single_image_pistol_yields_one_event() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("bag.png");
    RgbImage::from_pixel(80, 60, Rgb([120, 90, 60])).save(&path)?;
    let frame = load_image(&path)?;

    let pistol = Detection::new(3, 91.2, BoundingBox { x: 10.0, y: 10.0, w: 20.0, h: 15.0 });
    let adapter = share(ScriptedAdapter::new(vec![ScriptStep::Detect(vec![pistol])]));
    let mut tally = Tally::default();

    let detection = SingleShotDetector::new(adapter)
        .scan(&frame, &mut tally)?
        .expect("pistol detected");

    assert_eq!(detection.class, ObjectClass::Pistol);
    assert_eq!(detection.class_name(), "Pistol");
    assert!((detection.confidence - 91.2).abs() < f32::EPSILON);
    assert_eq!(tally.detections, vec!["Pistol".to_string()]);
    assert!(tally.logs.contains(&"Detected: Pistol (91.20%)".to_string()));
    Ok(())
}
