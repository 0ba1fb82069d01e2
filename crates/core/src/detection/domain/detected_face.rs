use serde::{Deserialize, Deserializer, Serialize};

/// Axis-aligned face box in coordinates normalized to `[0, 1]` of the
/// frame's width and height.
///
/// Construction clamps the box into the unit square, so every instance
/// satisfies `0 <= x <= x + width <= 1` (and likewise for `y`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBox")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Deserialize)]
struct RawBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl From<RawBox> for BoundingBox {
    fn from(raw: RawBox) -> Self {
        BoundingBox::new(raw.x, raw.y, raw.width, raw.height)
    }
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        let x = unit(x);
        let y = unit(y);
        Self {
            x,
            y,
            width: unit(width).min(1.0 - x),
            height: unit(height).min(1.0 - y),
        }
    }

    /// Builds a normalized box from pixel corners `(x1, y1, x2, y2)`.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64, frame_w: u32, frame_h: u32) -> Self {
        let fw = frame_w.max(1) as f64;
        let fh = frame_h.max(1) as f64;
        let nx1 = unit(x1 / fw);
        let ny1 = unit(y1 / fh);
        let nx2 = unit(x2 / fw);
        let ny2 = unit(y2 / fh);
        Self::new(nx1, ny1, (nx2 - nx1).max(0.0), (ny2 - ny1).max(0.0))
    }

    /// Euclidean distance between the top-left corners of two boxes.
    pub fn corner_distance(&self, other: &BoundingBox) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A normalized landmark point (eye, nose, mouth corner...).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    #[serde(deserialize_with = "deserialize_unit")]
    pub x: f64,
    #[serde(deserialize_with = "deserialize_unit")]
    pub y: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: unit(x),
            y: unit(y),
        }
    }
}

/// One detector observation. Produced fresh by every detection call and
/// never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bounding_box: BoundingBox,
    #[serde(deserialize_with = "deserialize_unit")]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<Vec<Landmark>>,
}

impl DetectedFace {
    pub fn new(bounding_box: BoundingBox, confidence: f64) -> Self {
        Self {
            bounding_box,
            confidence: unit(confidence),
            landmarks: None,
        }
    }

    pub fn with_landmarks(mut self, landmarks: Vec<Landmark>) -> Self {
        self.landmarks = Some(landmarks);
        self
    }
}

/// Keeps detections whose confidence reaches `threshold`.
pub fn filter_by_confidence(faces: &[DetectedFace], threshold: f64) -> Vec<DetectedFace> {
    faces
        .iter()
        .filter(|f| f.confidence >= threshold)
        .cloned()
        .collect()
}

fn deserialize_unit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    f64::deserialize(deserializer).map(unit)
}

fn unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}
