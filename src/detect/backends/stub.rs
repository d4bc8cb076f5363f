use crate::detect::backend::DetectionAdapter;
use crate::detect::result::InferenceResult;
use crate::error::InferenceError;
use crate::frame::Frame;

/// Stub adapter. Never detects; the annotated frame is an untouched copy.
#[derive(Default)]
pub struct StubAdapter {
    calls: u64,
}

impl StubAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectionAdapter for StubAdapter {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, frame: &Frame) -> Result<InferenceResult, InferenceError> {
        if frame.is_empty() {
            return Err(InferenceError::InvalidFrame(format!(
                "empty {}x{} frame",
                frame.width(),
                frame.height()
            )));
        }
        self.calls += 1;
        Ok(InferenceResult {
            detections: Vec::new(),
            annotated: frame.clone(),
        })
    }
}
