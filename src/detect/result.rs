use std::fmt;

use crate::frame::Frame;

/// Class table of the trained weapon model, indexed by class id.
pub const CLASS_NAMES: [&str; 5] = ["Grenade", "Knife", "Missile", "Pistol", "Rifle"];

#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Grenade,
    Knife,
    Missile,
    Pistol,
    Rifle,
    Unknown,
}

impl ObjectClass {
    /// Map a model class id. Ids outside the table are `Unknown`.
    pub fn from_id(class_id: u32) -> Self {
        match class_id {
            0 => ObjectClass::Grenade,
            1 => ObjectClass::Knife,
            2 => ObjectClass::Missile,
            3 => ObjectClass::Pistol,
            4 => ObjectClass::Rifle,
            _ => ObjectClass::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ObjectClass::Grenade => CLASS_NAMES[0],
            ObjectClass::Knife => CLASS_NAMES[1],
            ObjectClass::Missile => CLASS_NAMES[2],
            ObjectClass::Pistol => CLASS_NAMES[3],
            ObjectClass::Rifle => CLASS_NAMES[4],
            ObjectClass::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bounding box in frame pixel coordinates (top-left origin).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.w).min(other.x + other.w);
        let y2 = (self.y + self.h).min(other.y + other.h);
        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub class: ObjectClass,
    /// Confidence in percent, 0..=100.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_id: u32, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            class: ObjectClass::from_id(class_id),
            confidence: confidence.clamp(0.0, 100.0),
            bbox,
        }
    }

    pub fn class_name(&self) -> &'static str {
        self.class.name()
    }
}

/// Output of one inference call.
#[derive(Clone, Debug)]
pub struct InferenceResult {
    /// Detections in the adapter's order.
    pub detections: Vec<Detection>,
    /// Copy of the input frame with detections drawn by the adapter.
    pub annotated: Frame,
}

impl InferenceResult {
    /// The detection that drives status, log and thumbnail output: the first
    /// one in adapter order, whatever its confidence.
    pub fn primary(&self) -> Option<&Detection> {
        self.detections.first()
    }
}
