//! One-off detection on a still image.
//!
//! Shares the model instance with the stream workers and reports through the
//! same `DetectionReporter`, so a hit on a still image produces the same
//! event, log line and thumbnail as a hit on a video frame.

use crate::detect::{infer_shared, Detection, SharedAdapter};
use crate::error::InferenceError;
use crate::event::{LogEntry, StatusUpdate, StreamSink};
use crate::frame::Frame;
use crate::report::DetectionReporter;

pub struct SingleShotDetector {
    adapter: SharedAdapter,
    reporter: DetectionReporter,
}

impl SingleShotDetector {
    pub fn new(adapter: SharedAdapter) -> Self {
        Self {
            adapter,
            reporter: DetectionReporter::default(),
        }
    }

    /// Run inference once and keep the first detection.
    pub fn detect_one(&self, frame: &Frame) -> Result<Option<Detection>, InferenceError> {
        Ok(self.infer(frame)?.0)
    }

    fn infer(&self, frame: &Frame) -> Result<(Option<Detection>, Frame), InferenceError> {
        let result = infer_shared(&self.adapter, frame)?;
        let detection = result.primary().cloned();
        Ok((detection, result.annotated))
    }

    /// `detect_one` plus operator output.
    ///
    /// Emits the annotated frame and a status line; on a hit, the detection
    /// event, log line and thumbnail follow. Inference failures are logged
    /// and returned.
    pub fn scan(
        &self,
        frame: &Frame,
        sink: &mut dyn StreamSink,
    ) -> Result<Option<Detection>, InferenceError> {
        sink.on_status(StatusUpdate::new("IMAGE SCAN ACTIVE", "Running model..."));

        let (detection, annotated) = match self.infer(frame) {
            Ok(shot) => shot,
            Err(err) => {
                log::error!("image inference failed: {}", err);
                sink.on_status(StatusUpdate::new("ERROR", "Model inference failed."));
                sink.on_log(LogEntry::new(format!("ERROR: Model inference error -> {err}")));
                return Err(err);
            }
        };

        sink.on_frame(&annotated);
        match detection {
            Some(detection) => {
                log::info!(
                    "image scan: {} at {:.2}%",
                    detection.class_name(),
                    detection.confidence
                );
                sink.on_status(StatusUpdate::detected(&detection));
                let message = format!(
                    "Detected: {} ({:.2}%)",
                    detection.class_name(),
                    detection.confidence
                );
                self.reporter.report(sink, &detection, annotated, None, message);
                Ok(Some(detection))
            }
            None => {
                log::info!("image scan: no detection");
                sink.on_status(StatusUpdate::new("NO DETECTION", "No weapon found."));
                sink.on_log(LogEntry::new("No weapon detected."));
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{share, BoundingBox, ObjectClass, ScriptStep, ScriptedAdapter, StubAdapter};
    use crate::event::ConsoleEvent;
    use image::RgbImage;

    fn frame() -> Frame {
        Frame::new(RgbImage::new(64, 48), 1)
    }

    #[test]
    fn detect_one_keeps_first_detection() -> anyhow::Result<()> {
        let adapter = share(ScriptedAdapter::new(vec![ScriptStep::Detect(vec![
            Detection::new(4, 60.0, BoundingBox::default()),
            Detection::new(3, 95.0, BoundingBox::default()),
        ])]));
        let detection = SingleShotDetector::new(adapter).detect_one(&frame())?;
        assert_eq!(detection.map(|d| d.class), Some(ObjectClass::Rifle));
        Ok(())
    }

    #[test]
    fn no_detection_reports_clear_result() -> anyhow::Result<()> {
        let mut sink: Vec<ConsoleEvent> = Vec::new();
        let detection = SingleShotDetector::new(share(StubAdapter::new())).scan(&frame(), &mut sink)?;

        assert!(detection.is_none());
        assert!(!sink.iter().any(|e| matches!(e, ConsoleEvent::Detection(_))));
        assert!(sink.iter().any(|e| matches!(
            e,
            ConsoleEvent::Status(s) if s.status == "NO DETECTION"
        )));
        assert!(matches!(sink.last(), Some(ConsoleEvent::Log(l)) if l.message() == "No weapon detected."));
        Ok(())
    }

    #[test]
    fn inference_error_is_returned_and_logged() {
        let adapter = share(ScriptedAdapter::new(vec![ScriptStep::Fail("bad weights".to_string())]));
        let mut sink: Vec<ConsoleEvent> = Vec::new();

        let result = SingleShotDetector::new(adapter).scan(&frame(), &mut sink);

        assert!(matches!(result, Err(InferenceError::Model(_))));
        assert!(matches!(
            sink.last(),
            Some(ConsoleEvent::Log(l)) if l.message().starts_with("ERROR: Model inference error -> ")
        ));
    }
}
