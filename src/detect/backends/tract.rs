#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::annotate::draw_detections;
use crate::detect::backend::DetectionAdapter;
use crate::detect::result::{BoundingBox, Detection, InferenceResult, CLASS_NAMES};
use crate::error::InferenceError;
use crate::frame::Frame;

const NMS_IOU_THRESHOLD: f32 = 0.45;

/// Tract-based adapter for a YOLOv8 ONNX export.
///
/// Loads a local model file, resizes each frame to the model input, and
/// decodes the `[1, 4 + classes, anchors]` output into detections ordered by
/// descending confidence. No network I/O; nothing is written to disk.
pub struct TractAdapter {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_width: u32,
    input_height: u32,
    /// Minimum class score in 0..=1.
    confidence_threshold: f32,
}

impl TractAdapter {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_width: u32, input_height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_width,
            input_height,
            confidence_threshold: 0.25,
        })
    }

    /// Override the default confidence threshold (0..=1).
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let resized = image::imageops::resize(
            frame.image(),
            self.input_width,
            self.input_height,
            FilterType::Triangle,
        );
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.input_height as usize, self.input_width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        input.into_tensor()
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<Detection>, InferenceError> {
        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::Model("model produced no outputs".to_string()))?;
        let scores = output
            .to_array_view::<f32>()
            .map_err(|err| InferenceError::Model(format!("output tensor was not f32: {err}")))?;
        let shape = scores.shape().to_vec();
        let scores = scores
            .into_dimensionality::<tract_ndarray::Ix3>()
            .map_err(|_| InferenceError::Model(format!("unexpected output shape {:?}", shape)))?;
        if shape[1] < 4 + CLASS_NAMES.len() {
            return Err(InferenceError::Model(format!(
                "unexpected output shape {:?}",
                shape
            )));
        }

        let scale_x = frame.width() as f32 / self.input_width as f32;
        let scale_y = frame.height() as f32 / self.input_height as f32;
        let classes = shape[1] - 4;

        let mut candidates = Vec::new();
        for anchor in 0..shape[2] {
            let (class_id, score) = (0..classes)
                .map(|c| (c, scores[[0, 4 + c, anchor]]))
                .fold((0, f32::NEG_INFINITY), |best, next| {
                    if next.1 > best.1 {
                        next
                    } else {
                        best
                    }
                });
            if score < self.confidence_threshold {
                continue;
            }
            let cx = scores[[0, 0, anchor]];
            let cy = scores[[0, 1, anchor]];
            let w = scores[[0, 2, anchor]];
            let h = scores[[0, 3, anchor]];
            let bbox = BoundingBox {
                x: (cx - w / 2.0) * scale_x,
                y: (cy - h / 2.0) * scale_y,
                w: w * scale_x,
                h: h * scale_y,
            };
            candidates.push(Detection::new(class_id as u32, score * 100.0, bbox));
        }

        Ok(non_max_suppression(candidates))
    }
}

/// Greedy per-class NMS; survivors are ordered by descending confidence.
fn non_max_suppression(mut candidates: Vec<Detection>) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        let overlaps = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > NMS_IOU_THRESHOLD
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

impl DetectionAdapter for TractAdapter {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, frame: &Frame) -> Result<InferenceResult, InferenceError> {
        if frame.is_empty() {
            return Err(InferenceError::InvalidFrame("empty frame".to_string()));
        }
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|err| InferenceError::Model(format!("ONNX inference failed: {err}")))?;
        let detections = self.decode(outputs, frame)?;

        let mut annotated = frame.image().clone();
        draw_detections(&mut annotated, &detections);
        Ok(InferenceResult {
            detections,
            annotated: frame.with_image(annotated),
        })
    }
}
