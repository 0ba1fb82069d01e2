use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::shared::frame::Frame;

pub type Recording = HashMap<usize, Vec<DetectedFace>>;

/// Replays recorded detections by frame index.
///
/// A recording is a JSON object mapping frame indices to face lists:
/// `{"0": [{"bounding_box": {...}, "confidence": 0.9}], "3": []}`.
/// Frames with no entry yield no faces.
pub struct ReplayFaceDetector {
    path: Option<PathBuf>,
    recording: Option<Arc<Recording>>,
}

impl ReplayFaceDetector {
    pub fn new(recording: Arc<Recording>) -> Self {
        Self {
            path: None,
            recording: Some(recording),
        }
    }

    /// The file is read in [`FaceDetector::init`], not here.
    pub fn from_json_file(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            recording: None,
        }
    }
}

pub fn load_recording(path: &Path) -> Result<Recording, DetectionError> {
    let json = fs::read_to_string(path).map_err(|e| {
        DetectionError::Unavailable(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&json).map_err(|e| {
        DetectionError::Unavailable(format!("invalid recording {}: {e}", path.display()))
    })
}

impl FaceDetector for ReplayFaceDetector {
    fn init(&mut self) -> Result<(), DetectionError> {
        if self.recording.is_some() {
            return Ok(());
        }
        let Some(path) = &self.path else {
            return Err(DetectionError::Unavailable("no recording configured".into()));
        };
        let recording = load_recording(path)?;
        log::info!(
            "Loaded detection recording {} ({} frames)",
            path.display(),
            recording.len()
        );
        self.recording = Some(Arc::new(recording));
        Ok(())
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, DetectionError> {
        let recording = self
            .recording
            .as_ref()
            .ok_or_else(|| DetectionError::Unavailable("recording not loaded".into()))?;
        Ok(recording.get(&frame.index()).cloned().unwrap_or_default())
    }

    fn dispose(&mut self) {
        // File-backed recordings can be reloaded by the next init.
        if self.path.is_some() {
            self.recording = None;
        }
    }
}
