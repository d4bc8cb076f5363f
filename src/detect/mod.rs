mod annotate;
mod backend;
mod backends;
mod registry;
mod result;

pub use backend::{infer_shared, share, DetectionAdapter, SharedAdapter};
#[cfg(feature = "backend-tract")]
pub use backends::TractAdapter;
pub use backends::{ScriptStep, ScriptedAdapter, StubAdapter};
pub use registry::AdapterRegistry;
pub use result::{BoundingBox, Detection, InferenceResult, ObjectClass, CLASS_NAMES};
