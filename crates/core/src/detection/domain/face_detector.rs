use thiserror::Error;

use crate::shared::frame::Frame;

use super::detected_face::DetectedFace;

#[derive(Error, Debug)]
pub enum DetectionError {
    /// The backend is not loaded (never initialized, or init failed).
    /// Treated as "zero faces" by the pipeline.
    #[error("face detector unavailable: {0}")]
    Unavailable(String),
    /// A single detection call failed. The frame is dropped.
    #[error("face detection failed: {0}")]
    Failed(String),
}

impl DetectionError {
    pub fn failed(err: impl std::fmt::Display) -> Self {
        DetectionError::Failed(err.to_string())
    }
}

/// Domain interface for face detection backends.
///
/// Instances are constructed by the caller and handed to the pipeline,
/// which drives `init` once before the first `detect` and `dispose` once
/// when it shuts down. Implementations may be slow; they run on the
/// pipeline's detector worker, hence `Send`.
pub trait FaceDetector: Send {
    fn init(&mut self) -> Result<(), DetectionError> {
        Ok(())
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, DetectionError>;

    fn dispose(&mut self) {}
}
