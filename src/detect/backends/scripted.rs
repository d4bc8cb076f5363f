use std::collections::VecDeque;

use crate::detect::annotate::draw_detections;
use crate::detect::backend::DetectionAdapter;
use crate::detect::result::{Detection, InferenceResult};
use crate::error::InferenceError;
use crate::frame::Frame;

/// One scripted inference outcome.
#[derive(Clone, Debug)]
pub enum ScriptStep {
    Detect(Vec<Detection>),
    Fail(String),
}

/// Replays scripted outcomes, one per `infer` call, then the fallback
/// (no detections unless configured otherwise).
pub struct ScriptedAdapter {
    script: VecDeque<ScriptStep>,
    fallback: ScriptStep,
    calls: u64,
}

impl ScriptedAdapter {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script: script.into(),
            fallback: ScriptStep::Detect(Vec::new()),
            calls: 0,
        }
    }

    /// Outcome used once the script is exhausted.
    pub fn with_fallback(mut self, fallback: ScriptStep) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl DetectionAdapter for ScriptedAdapter {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn infer(&mut self, frame: &Frame) -> Result<InferenceResult, InferenceError> {
        self.calls += 1;
        let step = self
            .script
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match step {
            ScriptStep::Fail(reason) => Err(InferenceError::Model(reason)),
            ScriptStep::Detect(detections) => {
                let mut annotated = frame.image().clone();
                draw_detections(&mut annotated, &detections);
                Ok(InferenceResult {
                    detections,
                    annotated: frame.with_image(annotated),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::{BoundingBox, ObjectClass};
    use image::RgbImage;

    fn pistol() -> Detection {
        Detection::new(3, 91.2, BoundingBox { x: 1.0, y: 1.0, w: 3.0, h: 3.0 })
    }

    #[test]
    fn replays_script_then_fallback() {
        let mut adapter = ScriptedAdapter::new(vec![
            ScriptStep::Detect(vec![pistol()]),
            ScriptStep::Fail("gpu lost".to_string()),
        ]);
        let frame = Frame::new(RgbImage::new(8, 8), 1);

        let first = adapter.infer(&frame).unwrap();
        assert_eq!(first.primary().unwrap().class, ObjectClass::Pistol);
        assert_ne!(first.annotated.pixels(), frame.pixels());

        assert!(matches!(adapter.infer(&frame), Err(InferenceError::Model(_))));

        let third = adapter.infer(&frame).unwrap();
        assert!(third.detections.is_empty());
        assert_eq!(adapter.calls(), 3);
        assert_eq!(adapter.remaining(), 0);
    }

    #[test]
    fn fallback_can_repeat_a_detection() {
        let mut adapter =
            ScriptedAdapter::new(Vec::new()).with_fallback(ScriptStep::Detect(vec![pistol()]));
        let frame = Frame::new(RgbImage::new(8, 8), 1);
        for _ in 0..3 {
            assert_eq!(adapter.infer(&frame).unwrap().detections.len(), 1);
        }
    }
}
