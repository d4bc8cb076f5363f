//! scan_console - weapon detection operator console
//!
//! This binary:
//! 1. Loads console configuration (SCAN_CONFIG file + SCAN_* environment)
//! 2. Selects a detection adapter from the registry
//! 3. Runs one feed (image, video file or camera) on a worker thread
//! 4. Prints status, detections and log lines as the presentation thread
//! 5. Stops every feed on Ctrl-C

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use weapon_scan::{
    load_image, AdapterRegistry, BackendKind, BoundingBox, CameraConfig, CameraSource,
    ChannelSink, ConsoleConfig, ConsoleEvent, ConsoleState, Detection, FeedManager, FileConfig,
    FileSource, FrameSource, LogEntry, MediaDescriptor, ScriptStep, ScriptedAdapter,
    SharedAdapter, SingleShotDetector, StatusUpdate, StreamSettings, StreamSink, StubAdapter,
    Thumbnail,
};

const DEMO_DETECTION_PERIOD: u64 = 15;
const PUMP_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(author, version, about = "Weapon detection console for images, video files and cameras")]
struct Args {
    /// Output style.
    #[arg(long, value_enum, default_value_t = UiMode::Plain)]
    ui: UiMode,

    /// Write every proof-of-detection thumbnail as a PNG into this directory.
    #[arg(long, env = "SCAN_THUMBNAIL_DIR")]
    thumbnails: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a single image (.jpg, .jpeg, .png).
    Image { path: PathBuf },
    /// Scan a local video file (.mp4, .avi, .mkv, .mov) or a `stub://name#N` clip.
    Video { path: String },
    /// Scan a live camera feed.
    Webcam {
        /// Camera index (defaults to SCAN_CAMERA_INDEX / config).
        #[arg(long)]
        index: Option<u32>,
        /// Explicit device path, e.g. /dev/video2 or stub://cam.
        #[arg(long)]
        device: Option<String>,
    },
    /// Route a selection by extension, or treat a bare number as a camera index.
    Open { selection: String },
    /// Synthetic clip through a scripted adapter; needs no model or media.
    Demo {
        #[arg(long, default_value_t = 90)]
        frames: u64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum UiMode {
    /// Every status change and log line.
    Plain,
    /// Detections and the final summary only.
    Quiet,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = ConsoleConfig::load()?;
    log::info!(
        "scan_console starting: backend={}, frame interval={}ms, log capacity={}",
        cfg.backend.name(),
        cfg.frame_interval.as_millis(),
        cfg.log_capacity
    );

    let registry = build_registry(&cfg, &args.command)?;
    let adapter = registry
        .default_adapter()
        .ok_or_else(|| anyhow!("no detection adapter registered"))?;
    log::info!(
        "detection adapter: {} (available: {})",
        registry.default_name().unwrap_or("none"),
        registry.list().join(", ")
    );

    let mut console = Console::new(&cfg, args.ui, args.thumbnails.clone());
    console.boot();

    match args.command {
        Command::Image { path } => console.scan_image(&adapter, &path),
        Command::Video { path } => {
            let source = FileSource::new(FileConfig::new(path))?;
            console.stream(&adapter, &cfg, source)
        }
        Command::Webcam { index, device } => {
            let camera = match device {
                Some(device) => CameraConfig::with_device(device),
                None => CameraConfig::with_index(index.unwrap_or(cfg.camera_index)),
            };
            console.stream(&adapter, &cfg, CameraSource::new(camera))
        }
        Command::Open { selection } => match MediaDescriptor::classify(&selection)? {
            MediaDescriptor::Image(path) => console.scan_image(&adapter, &path),
            MediaDescriptor::Video(path) => {
                let source = FileSource::new(FileConfig::new(path.to_string_lossy()))?;
                console.stream(&adapter, &cfg, source)
            }
            MediaDescriptor::Camera(index) => {
                console.stream(&adapter, &cfg, CameraSource::new(CameraConfig::with_index(index)))
            }
        },
        Command::Demo { frames } => {
            let source = FileSource::new(FileConfig::new(format!("stub://demo#{frames}")))?;
            console.stream(&adapter, &cfg, source)
        }
    }
}

fn build_registry(cfg: &ConsoleConfig, command: &Command) -> Result<AdapterRegistry> {
    let mut registry = AdapterRegistry::new();
    registry.register(StubAdapter::new());

    let demo = matches!(command, Command::Demo { .. });
    if demo || cfg.backend == BackendKind::Scripted {
        let frames = match command {
            Command::Demo { frames } => *frames,
            _ => 300,
        };
        registry.register(
            ScriptedAdapter::new(demo_script(frames)).with_fallback(ScriptStep::Detect(Vec::new())),
        );
    }

    if cfg.backend == BackendKind::Tract && !demo {
        register_tract(&mut registry, cfg)?;
    }

    let default = if demo { "scripted" } else { cfg.backend.name() };
    registry.set_default(default)?;
    Ok(registry)
}

#[cfg(feature = "backend-tract")]
fn register_tract(registry: &mut AdapterRegistry, cfg: &ConsoleConfig) -> Result<()> {
    let adapter = weapon_scan::TractAdapter::new(
        &cfg.model.path,
        cfg.model.input_width,
        cfg.model.input_height,
    )?
    .with_threshold(cfg.model.confidence_threshold);
    registry.register(adapter);
    Ok(())
}

#[cfg(not(feature = "backend-tract"))]
fn register_tract(_registry: &mut AdapterRegistry, cfg: &ConsoleConfig) -> Result<()> {
    Err(anyhow!(
        "backend 'tract' ({}) requires building with the backend-tract feature",
        cfg.model.path.display()
    ))
}

/// One detection every `DEMO_DETECTION_PERIOD` frames, cycling through the classes.
fn demo_script(frames: u64) -> Vec<ScriptStep> {
    (0..frames)
        .map(|i| {
            if i % DEMO_DETECTION_PERIOD == DEMO_DETECTION_PERIOD / 2 {
                let class_id = ((i / DEMO_DETECTION_PERIOD) % 5) as u32;
                let confidence = 60.0 + ((i * 7) % 40) as f32;
                let bbox = BoundingBox {
                    x: 40.0 + (i % 100) as f32,
                    y: 60.0,
                    w: 80.0,
                    h: 60.0,
                };
                ScriptStep::Detect(vec![Detection::new(class_id, confidence, bbox)])
            } else {
                ScriptStep::Detect(Vec::new())
            }
        })
        .collect()
}

/// Presentation thread: owns `ConsoleState` and prints what workers report.
struct Console {
    state: ConsoleState,
    out: Printer,
}

impl Console {
    fn new(cfg: &ConsoleConfig, ui: UiMode, thumbnail_dir: Option<PathBuf>) -> Self {
        Self {
            state: ConsoleState::new(cfg.log_capacity),
            out: Printer {
                ui,
                thumbnail_dir,
                thumbnails_written: 0,
                last_printed: None,
            },
        }
    }

    fn boot(&mut self) {
        self.state.boot();
        if self.out.ui == UiMode::Plain {
            for entry in self.state.log().iter() {
                println!("{}", entry);
            }
        }
    }

    fn scan_image(&mut self, adapter: &SharedAdapter, path: &Path) -> Result<()> {
        let mut events: Vec<ConsoleEvent> = Vec::new();
        events.on_log(LogEntry::new(format!("Image selected: {}", path.display())));

        let frame = match load_image(path) {
            Ok(frame) => frame,
            Err(err) => {
                events.on_log(LogEntry::new(format!("ERROR: Cannot load image -> {err}")));
                self.show_all(events);
                return Err(err).context("image scan failed");
            }
        };

        let outcome = SingleShotDetector::new(Arc::clone(adapter)).scan(&frame, &mut events);
        self.show_all(events);
        outcome.context("image scan failed")?;
        self.summary();
        Ok(())
    }

    fn stream<S>(&mut self, adapter: &SharedAdapter, cfg: &ConsoleConfig, source: S) -> Result<()>
    where
        S: FrameSource + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        let settings = StreamSettings {
            frame_interval: cfg.frame_interval,
        };
        let feeds = Arc::new(FeedManager::new(Arc::clone(adapter), settings, ChannelSink::new(tx)));

        let stopper = Arc::clone(&feeds);
        ctrlc::set_handler(move || {
            stopper.stop_all();
        })
        .context("error setting Ctrl-C handler")?;

        let handle = feeds.start(source)?;
        let feed_id = handle.id();
        self.pump_until_finished(&rx, feed_id)?;

        let report = handle.join()?;
        self.summary();
        match report.error {
            Some(cause) => Err(anyhow!("feed ended with error: {}", cause)),
            None => Ok(()),
        }
    }

    fn pump_until_finished(&mut self, rx: &Receiver<ConsoleEvent>, feed_id: u64) -> Result<()> {
        let out = &mut self.out;
        while self.state.report_for(feed_id).is_none() {
            if !self.state.pump(rx, PUMP_TIMEOUT, |event| out.show(event)) {
                return Err(anyhow!("feed {} worker went away without a report", feed_id));
            }
        }
        Ok(())
    }

    fn show_all(&mut self, events: Vec<ConsoleEvent>) {
        for event in events {
            self.out.show(&event);
            self.state.apply(event);
        }
    }

    fn summary(&self) {
        let finished = self.state.finished();
        let frames: u64 = finished.iter().map(|(_, report)| report.frames_processed).sum();
        println!(
            "SUMMARY: {} | frames={} detections={} log entries={} (evicted {})",
            self.state.status(),
            frames,
            self.state.detection_count(),
            self.state.log().len(),
            self.state.log().evicted()
        );
    }
}

/// Console output and thumbnail files.
struct Printer {
    ui: UiMode,
    thumbnail_dir: Option<PathBuf>,
    thumbnails_written: u64,
    last_printed: Option<StatusUpdate>,
}

impl Printer {
    fn show(&mut self, event: &ConsoleEvent) {
        let quiet = self.ui == UiMode::Quiet;
        match event {
            ConsoleEvent::State { update, .. } if !quiet => {
                println!("{}", update);
                self.last_printed = Some(update.clone());
            }
            // Repeated scanning lines are noise; print changes only.
            ConsoleEvent::Status(update) if !quiet && self.last_printed.as_ref() != Some(update) => {
                println!("{}", update);
                self.last_printed = Some(update.clone());
            }
            ConsoleEvent::Detection(detection) => {
                println!(
                    ">> {} ({:.2}%)",
                    detection.label(),
                    detection.confidence_percent()
                );
            }
            ConsoleEvent::Log(entry) => {
                if !quiet {
                    println!("{}", entry);
                }
                if let Some(thumbnail) = entry.thumbnail_image() {
                    self.save_thumbnail(thumbnail);
                }
            }
            _ => {}
        }
    }

    fn save_thumbnail(&mut self, thumbnail: &Thumbnail) {
        let Some(dir) = &self.thumbnail_dir else {
            return;
        };
        self.thumbnails_written += 1;
        let path = dir.join(format!("detection-{:04}.png", self.thumbnails_written));
        let written = std::fs::create_dir_all(dir)
            .map_err(anyhow::Error::from)
            .and_then(|_| thumbnail.image().save(&path).map_err(anyhow::Error::from));
        match written {
            Ok(()) => log::info!("thumbnail written to {}", path.display()),
            Err(err) => log::warn!("failed to write thumbnail {}: {}", path.display(), err),
        }
    }
}
