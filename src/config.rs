use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::log_book::DEFAULT_LOG_CAPACITY;

const DEFAULT_MODEL_PATH: &str = "models/weapons-yolov8.onnx";
const DEFAULT_MODEL_WIDTH: u32 = 640;
const DEFAULT_MODEL_HEIGHT: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_FRAME_INTERVAL_MS: u64 = 10;
const DEFAULT_CAMERA_INDEX: u32 = 0;

#[derive(Debug, Deserialize, Default)]
struct ConsoleConfigFile {
    backend: Option<String>,
    model: Option<ModelConfigFile>,
    stream: Option<StreamConfigFile>,
    log_capacity: Option<usize>,
    camera_index: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    frame_interval_ms: Option<u64>,
}

/// Which detection adapter the console runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Stub,
    Scripted,
    Tract,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Stub => "stub",
            BackendKind::Scripted => "scripted",
            BackendKind::Tract => "tract",
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(BackendKind::Stub),
            "scripted" => Ok(BackendKind::Scripted),
            "tract" => Ok(BackendKind::Tract),
            other => Err(anyhow!(
                "unknown backend {:?} (expected stub, scripted or tract)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub backend: BackendKind,
    pub model: ModelSettings,
    pub frame_interval: Duration,
    pub log_capacity: usize,
    pub camera_index: u32,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub path: PathBuf,
    pub input_width: u32,
    pub input_height: u32,
    /// Minimum class score in 0..=1.
    pub confidence_threshold: f32,
}

impl ConsoleConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SCAN_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConsoleConfigFile) -> Result<Self> {
        let backend = match file.backend.as_deref() {
            Some(name) => name.parse()?,
            None => BackendKind::Stub,
        };
        let model = ModelSettings {
            path: file
                .model
                .as_ref()
                .and_then(|model| model.path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            input_width: file
                .model
                .as_ref()
                .and_then(|model| model.input_width)
                .unwrap_or(DEFAULT_MODEL_WIDTH),
            input_height: file
                .model
                .as_ref()
                .and_then(|model| model.input_height)
                .unwrap_or(DEFAULT_MODEL_HEIGHT),
            confidence_threshold: file
                .model
                .as_ref()
                .and_then(|model| model.confidence_threshold)
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
        };
        let frame_interval = Duration::from_millis(
            file.stream
                .and_then(|stream| stream.frame_interval_ms)
                .unwrap_or(DEFAULT_FRAME_INTERVAL_MS),
        );
        Ok(Self {
            backend,
            model,
            frame_interval,
            log_capacity: file.log_capacity.unwrap_or(DEFAULT_LOG_CAPACITY),
            camera_index: file.camera_index.unwrap_or(DEFAULT_CAMERA_INDEX),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var("SCAN_BACKEND") {
            if !backend.trim().is_empty() {
                self.backend = backend.parse()?;
            }
        }
        if let Ok(path) = std::env::var("SCAN_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model.path = PathBuf::from(path);
            }
        }
        if let Ok(interval) = std::env::var("SCAN_FRAME_INTERVAL_MS") {
            let millis: u64 = interval.trim().parse().map_err(|_| {
                anyhow!("SCAN_FRAME_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.frame_interval = Duration::from_millis(millis);
        }
        if let Ok(capacity) = std::env::var("SCAN_LOG_CAPACITY") {
            self.log_capacity = capacity
                .trim()
                .parse()
                .map_err(|_| anyhow!("SCAN_LOG_CAPACITY must be a positive integer"))?;
        }
        if let Ok(index) = std::env::var("SCAN_CAMERA_INDEX") {
            self.camera_index = index
                .trim()
                .parse()
                .map_err(|_| anyhow!("SCAN_CAMERA_INDEX must be a non-negative integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.log_capacity == 0 {
            return Err(anyhow!("log capacity must be greater than zero"));
        }
        if self.model.input_width == 0 || self.model.input_height == 0 {
            return Err(anyhow!("model input dimensions must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.model.confidence_threshold) {
            return Err(anyhow!("confidence threshold must be within 0..=1"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ConsoleConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
