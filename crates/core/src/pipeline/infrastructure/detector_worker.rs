use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::shared::frame::Frame;

/// A frame handed to the worker, tagged so stale answers can be told apart.
struct DetectionRequest {
    ticket: u64,
    frame: Frame,
}

/// The worker's answer: the frame travels back with its detections.
pub struct DetectionOutcome {
    pub ticket: u64,
    pub frame: Frame,
    pub result: Result<Vec<DetectedFace>, DetectionError>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("detector worker is still busy")]
    Busy,
    #[error("detector worker has stopped")]
    Lost,
}

/// Runs a [`FaceDetector`] on its own thread.
///
/// Requests and responses travel over bounded channels of capacity one.
/// The worker calls `init` before its first request and `dispose` once the
/// request channel closes. A panic inside the detector is caught and
/// reported as a failed detection; the thread keeps serving. Dropping the
/// worker closes the channel and joins the thread.
pub struct DetectorWorker {
    request_tx: Option<Sender<DetectionRequest>>,
    response_rx: Receiver<DetectionOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl DetectorWorker {
    pub fn spawn(detector: Box<dyn FaceDetector>) -> Self {
        let (request_tx, request_rx) = crossbeam_channel::bounded::<DetectionRequest>(1);
        let (response_tx, response_rx) = crossbeam_channel::bounded::<DetectionOutcome>(1);
        let handle = match std::thread::Builder::new()
            .name("face-detector".into())
            .spawn(move || run(detector, request_rx, response_tx))
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to spawn detector thread: {e}");
                None
            }
        };
        Self {
            request_tx: Some(request_tx),
            response_rx,
            handle,
        }
    }

    /// Hands `frame` to the worker without blocking.
    pub fn submit(&self, ticket: u64, frame: Frame) -> Result<(), WorkerError> {
        let tx = self.request_tx.as_ref().ok_or(WorkerError::Lost)?;
        if self.handle.is_none() {
            return Err(WorkerError::Lost);
        }
        tx.try_send(DetectionRequest { ticket, frame })
            .map_err(|e| match e {
                TrySendError::Full(_) => WorkerError::Busy,
                TrySendError::Disconnected(_) => WorkerError::Lost,
            })
    }

    /// Returns the next finished detection, if any, without blocking.
    pub fn try_receive(&self) -> Result<Option<DetectionOutcome>, WorkerError> {
        match self.response_rx.try_recv() {
            Ok(outcome) => Ok(Some(outcome)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(WorkerError::Lost),
        }
    }

    /// Lets the thread wind down on its own instead of joining it.
    ///
    /// A detection still running finishes, finds nobody listening, and the
    /// thread then disposes its detector and exits.
    pub fn retire(mut self) {
        self.handle = None;
    }
}

fn run(
    mut detector: Box<dyn FaceDetector>,
    request_rx: Receiver<DetectionRequest>,
    response_tx: Sender<DetectionOutcome>,
) {
    match guarded(|| detector.init()) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!("Face detector failed to initialize: {e}"),
        Err(reason) => log::error!("Face detector panicked during init: {reason}"),
    }
    for DetectionRequest { ticket, frame } in request_rx {
        let result = guarded(|| detector.detect(&frame)).unwrap_or_else(|reason| {
            log::error!("Face detector panicked on frame {}: {reason}", frame.index());
            Err(DetectionError::Failed(format!("detector panicked: {reason}")))
        });
        if response_tx
            .send(DetectionOutcome {
                ticket,
                frame,
                result,
            })
            .is_err()
        {
            break;
        }
    }
    if let Err(reason) = guarded(|| detector.dispose()) {
        log::error!("Face detector panicked during dispose: {reason}");
    }
    log::debug!("Detector worker exiting");
}

/// Runs `f`, turning a panic into its message.
fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string())
    })
}

impl Drop for DetectorWorker {
    fn drop(&mut self) {
        self.request_tx = None;
        // Release the response side too, so a worker blocked on delivering
        // a result nobody will read can exit.
        self.response_rx = crossbeam_channel::never();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Detector thread panicked");
            }
        }
    }
}
