use crate::shared::frame::Frame;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to write frame {index}: {reason}")]
    Write { index: usize, reason: String },
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Receives every anonymized frame, in completion order.
pub trait FrameSink: Send {
    fn present(&mut self, frame: &Frame) -> Result<(), SinkError>;

    /// Flushes anything buffered. Called once when the host is done.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Discards every frame.
#[derive(Debug, Default)]
pub struct NullFrameSink;

impl FrameSink for NullFrameSink {
    fn present(&mut self, _frame: &Frame) -> Result<(), SinkError> {
        Ok(())
    }
}
