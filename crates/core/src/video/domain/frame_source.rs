use std::path::PathBuf;

use crate::shared::frame::Frame;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("failed to list {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no frames found in {0}")]
    Empty(String),
    #[error("frame source error: {0}")]
    Other(String),
}

/// Pull-based supplier of frames for the scheduler.
///
/// `Ok(None)` means the source is exhausted. A source may still return
/// frames after an `Err`; errors only affect the frame being fetched.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}
