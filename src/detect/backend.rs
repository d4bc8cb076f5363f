use std::sync::{Arc, Mutex};

use crate::detect::result::InferenceResult;
use crate::error::InferenceError;
use crate::frame::Frame;

/// Detection adapter trait.
///
/// The adapter is the boundary to the detection model. The pipeline treats it
/// as an opaque black box: a call may take as long as the model needs and may
/// fail, and a failure ends the stream that made the call.
///
/// Implementations own bounding-box rendering: `InferenceResult::annotated`
/// is the frame as it should be shown to the operator.
pub trait DetectionAdapter: Send {
    /// Adapter identifier.
    fn name(&self) -> &'static str;

    /// Run the model on one frame.
    fn infer(&mut self, frame: &Frame) -> Result<InferenceResult, InferenceError>;
}

/// One model instance shared by the stream workers and the single-shot path.
///
/// Wrapped in `Mutex` because `DetectionAdapter::infer` takes `&mut self`.
pub type SharedAdapter = Arc<Mutex<dyn DetectionAdapter>>;

pub fn share<A: DetectionAdapter + 'static>(adapter: A) -> SharedAdapter {
    Arc::new(Mutex::new(adapter))
}

/// Run inference through a shared adapter.
pub fn infer_shared(adapter: &SharedAdapter, frame: &Frame) -> Result<InferenceResult, InferenceError> {
    let mut guard = adapter.lock().map_err(|_| InferenceError::Poisoned)?;
    guard.infer(frame)
}
