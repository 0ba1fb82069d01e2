//! YOLO-pose face detector on ONNX Runtime.
//!
//! Letterboxes the frame to the model's square input, runs inference,
//! applies greedy NMS and maps boxes and the five facial keypoints back to
//! coordinates normalized by the original frame size.

use std::path::{Path, PathBuf};

use crate::detection::domain::detected_face::{BoundingBox, DetectedFace, Landmark};
use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::shared::frame::Frame;

use ort::execution_providers::{CPUExecutionProvider, ExecutionProviderDispatch};

/// Fallback input resolution when the model's input shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Raw score floor applied before NMS. Pipeline-level confidence filtering
/// happens later, so this only discards noise.
pub const DEFAULT_MIN_SCORE: f64 = 0.25;

const NMS_IOU_THRESH: f64 = 0.45;

/// 5 keypoints × (x, y, conf).
const NUM_KEYPOINTS: usize = 5;
const NUM_KEYPOINT_VALUES: usize = NUM_KEYPOINTS * 3;

const KEYPOINT_CONF_THRESH: f64 = 0.5;

/// Letterbox padding value (YOLO convention).
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Where inference runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionTarget {
    /// CoreML on macOS, DirectML on Windows, then CPU.
    #[default]
    Accelerated,
    /// CPU only, for reproducible output or hosts with a broken GPU driver.
    Cpu,
}

impl ExecutionTarget {
    /// Providers in registration order. ONNX Runtime skips the ones it
    /// cannot register and always keeps CPU as the last resort.
    fn providers(self) -> Vec<ExecutionProviderDispatch> {
        let mut providers = match self {
            ExecutionTarget::Accelerated => platform_accelerators(),
            ExecutionTarget::Cpu => Vec::new(),
        };
        providers.push(CPUExecutionProvider::default().build());
        providers
    }
}

fn platform_accelerators() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    let providers = vec![ort::execution_providers::CoreMLExecutionProvider::default().build()];
    #[cfg(target_os = "windows")]
    let providers = vec![ort::execution_providers::DirectMLExecutionProvider::default().build()];
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let providers = Vec::new();
    providers
}

pub struct OnnxFaceDetector {
    model_path: PathBuf,
    min_score: f64,
    target: ExecutionTarget,
    session: Option<ort::session::Session>,
    input_size: u32,
}

impl OnnxFaceDetector {
    /// The model is not loaded until [`FaceDetector::init`].
    pub fn new(model_path: &Path) -> Self {
        Self {
            model_path: model_path.to_path_buf(),
            min_score: DEFAULT_MIN_SCORE,
            target: ExecutionTarget::default(),
            session: None,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_execution_target(mut self, target: ExecutionTarget) -> Self {
        self.target = target;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    fn load_session(&self) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(self.target.providers())?
            .commit_from_file(&self.model_path)?;
        Ok(session)
    }
}

/// Reads H from an NCHW input shape, if static.
fn model_input_size(session: &ort::session::Session) -> Option<u32> {
    let input = session.inputs().first()?;
    match input.dtype() {
        ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
            Some(shape[2] as u32)
        }
        _ => None,
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn init(&mut self) -> Result<(), DetectionError> {
        if self.is_loaded() {
            return Ok(());
        }
        let session = self.load_session().map_err(|e| {
            DetectionError::Unavailable(format!(
                "failed to load {}: {e}",
                self.model_path.display()
            ))
        })?;
        self.input_size = model_input_size(&session).unwrap_or(DEFAULT_INPUT_SIZE);
        log::info!(
            "Loaded face model {} (input {}x{}, {:?})",
            self.model_path.display(),
            self.input_size,
            self.input_size,
            self.target
        );
        self.session = Some(session);
        Ok(())
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, DetectionError> {
        let input_size = self.input_size;
        let min_score = self.min_score;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| DetectionError::Unavailable("model not loaded".into()))?;
        let (input, letterbox) = letterbox(frame, input_size)?;
        let input_value = ort::value::Tensor::from_array(input).map_err(DetectionError::failed)?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(DetectionError::failed)?;
        if outputs.len() == 0 {
            return Err(DetectionError::failed("model produced no outputs"));
        }
        let tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(DetectionError::failed)?;
        let shape = tensor.shape().to_vec();
        let data = tensor
            .as_slice()
            .ok_or_else(|| DetectionError::failed("output tensor is not contiguous"))?;

        let mut raw = parse_output(data, &shape, min_score, &letterbox)?;
        let kept = nms(&mut raw, NMS_IOU_THRESH);

        Ok(kept
            .into_iter()
            .map(|d| d.normalize(frame.width(), frame.height()))
            .collect())
    }

    fn dispose(&mut self) {
        if self.session.take().is_some() {
            log::debug!("Released face model {}", self.model_path.display());
        }
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// Letterbox-resizes a frame into a `1×3×S×S` float tensor in `[0, 1]`.
fn letterbox(
    frame: &Frame,
    target_size: u32,
) -> Result<(ndarray::Array4<f32>, Letterbox), DetectionError> {
    let src = frame.as_ndarray().map_err(DetectionError::failed)?;
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let size = target_size as usize;
    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, size, size), PAD_VALUE);

    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // nearest neighbour
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    Ok((
        tensor,
        Letterbox {
            scale,
            pad_x,
            pad_y,
        },
    ))
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// A detection in original-frame pixel coordinates.
#[derive(Clone, Debug)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
    keypoints: Option<[(f64, f64); NUM_KEYPOINTS]>,
}

impl RawDetection {
    fn corners(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    fn normalize(self, frame_w: u32, frame_h: u32) -> DetectedFace {
        let bbox = BoundingBox::from_corners(self.x1, self.y1, self.x2, self.y2, frame_w, frame_h);
        let face = DetectedFace::new(bbox, self.confidence);
        match self.keypoints {
            Some(points) => {
                let fw = frame_w.max(1) as f64;
                let fh = frame_h.max(1) as f64;
                face.with_landmarks(
                    points
                        .iter()
                        .map(|&(x, y)| Landmark::new(x / fw, y / fh))
                        .collect(),
                )
            }
            None => face,
        }
    }
}

/// Decodes a `[1, F, N]` or `[1, N, F]` output where each detection row is
/// `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]` in letterbox pixels.
fn parse_output(
    data: &[f32],
    shape: &[usize],
    min_score: f64,
    letterbox: &Letterbox,
) -> Result<Vec<RawDetection>, DetectionError> {
    if shape.len() != 3 {
        return Err(DetectionError::failed(format!(
            "unexpected output shape {shape:?}"
        )));
    }
    // Features are the smaller axis.
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if data.len() < num_dets * num_feats {
        return Err(DetectionError::failed("output tensor shorter than its shape"));
    }
    let value = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    let mut dets = Vec::new();
    if num_feats < 5 {
        return Ok(dets);
    }
    for i in 0..num_dets {
        let conf = value(i, 4);
        if conf < min_score {
            continue;
        }
        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        let (x1, y1) = letterbox.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_frame(cx + w / 2.0, cy + h / 2.0);

        // Landmarks are only reported when every keypoint is confident.
        let keypoints = if num_feats >= 5 + NUM_KEYPOINT_VALUES {
            let mut pts = [(0.0, 0.0); NUM_KEYPOINTS];
            let mut visible = true;
            for (k, pt) in pts.iter_mut().enumerate() {
                let base = 5 + k * 3;
                if value(i, base + 2) < KEYPOINT_CONF_THRESH {
                    visible = false;
                    break;
                }
                *pt = letterbox.to_frame(value(i, base), value(i, base + 1));
            }
            visible.then_some(pts)
        } else {
            None
        };

        dets.push(RawDetection {
            x1,
            y1,
            x2,
            y2,
            confidence: conf,
            keypoints,
        });
    }
    Ok(dets)
}

/// Greedy NMS: highest confidence first, suppress boxes overlapping a kept one.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in dets.iter() {
        if keep
            .iter()
            .all(|k| bbox_iou(&k.corners(), &det.corners()) <= iou_thresh)
        {
            keep.push(det.clone());
        }
    }
    keep
}

fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raw(x1: f64, y1: f64, x2: f64, y2: f64, confidence: f64) -> RawDetection {
        RawDetection {
            x1,
            y1,
            x2,
            y2,
            confidence,
            keypoints: None,
        }
    }

    const IDENTITY: Letterbox = Letterbox {
        scale: 1.0,
        pad_x: 0,
        pad_y: 0,
    };

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        let frame = Frame::solid(200, 100, [128, 128, 128], 0);
        let (tensor, lb) = letterbox(&frame, 640).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(lb.scale, 3.2);
        assert_eq!((lb.pad_x, lb.pad_y), (0, 160));
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let frame = Frame::solid(100, 50, [255, 255, 255], 0);
        let (tensor, lb) = letterbox(&frame, 640).unwrap();

        let y = lb.pad_y as usize + 1;
        assert_relative_eq!(tensor[[0, 0, y, 1]], 1.0);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], PAD_VALUE);
    }

    #[test]
    fn test_letterbox_rejects_truncated_frame() {
        let frame = Frame::new(vec![0; 7], 4, 4, 3, 2);
        assert!(matches!(letterbox(&frame, 640), Err(DetectionError::Failed(_))));
    }

    #[test]
    fn test_letterbox_maps_back_to_frame() {
        let lb = Letterbox {
            scale: 2.0,
            pad_x: 10,
            pad_y: 20,
        };
        assert_eq!(lb.to_frame(30.0, 60.0), (10.0, 20.0));
    }

    #[test]
    fn test_parse_row_major_output() {
        // [1, 8 detections, 5 features]; the first scores, the second is
        // below the floor, the rest are empty
        let mut data = vec![0.0f32; 8 * 5];
        data[..10].copy_from_slice(&[50.0, 40.0, 20.0, 20.0, 0.9, 10.0, 10.0, 4.0, 4.0, 0.1]);
        let dets = parse_output(&data, &[1, 8, 5], 0.25, &IDENTITY).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].corners(), [40.0, 30.0, 60.0, 50.0]);
        assert!(dets[0].keypoints.is_none());
    }

    #[test]
    fn test_parse_transposed_output() {
        // [1, 5 features, 6 detections]; only detection 2 scores
        let mut data = vec![0.0f32; 5 * 6];
        for (feat, v) in [10.0, 20.0, 4.0, 8.0, 0.8].into_iter().enumerate() {
            data[feat * 6 + 2] = v;
        }
        let dets = parse_output(&data, &[1, 5, 6], 0.25, &IDENTITY).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].corners(), [8.0, 16.0, 12.0, 24.0]);
        assert_relative_eq!(dets[0].confidence, 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_parse_keypoints_require_confidence() {
        let mut confident = vec![50.0f32, 50.0, 20.0, 20.0, 0.9];
        for k in 0..5 {
            confident.extend([40.0 + k as f32, 45.0, 0.9]);
        }
        let mut hidden = confident.clone();
        hidden[5 + 2] = 0.1;
        let mut data = confident;
        data.extend(hidden);
        // pad to 24 detections so the detection axis is the longer one
        data.resize(24 * 20, 0.0);

        let dets = parse_output(&data, &[1, 24, 20], 0.25, &IDENTITY).unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].keypoints.unwrap()[4], (44.0, 45.0));
        assert!(dets[1].keypoints.is_none());
    }

    #[test]
    fn test_parse_rejects_bad_shape() {
        assert!(matches!(
            parse_output(&[0.0; 4], &[4], 0.25, &IDENTITY),
            Err(DetectionError::Failed(_))
        ));
    }

    #[test]
    fn test_normalize_to_unit_square() {
        let face = raw(-10.0, 25.0, 50.0, 75.0, 0.7).normalize(100, 100);
        assert_relative_eq!(face.bounding_box.x, 0.0);
        assert_relative_eq!(face.bounding_box.y, 0.25);
        assert_relative_eq!(face.bounding_box.width, 0.5);
        assert_relative_eq!(face.bounding_box.height, 0.5);
        assert_relative_eq!(face.confidence, 0.7);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let mut dets = vec![raw(0.0, 0.0, 100.0, 100.0, 0.8), raw(5.0, 5.0, 105.0, 105.0, 0.9)];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_non_overlapping() {
        let mut dets = vec![raw(0.0, 0.0, 50.0, 50.0, 0.9), raw(200.0, 200.0, 250.0, 250.0, 0.8)];
        assert_eq!(nms(&mut dets, 0.3).len(), 2);
    }

    #[test]
    fn test_bbox_iou_partial_overlap() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [5.0, 5.0, 15.0, 15.0];
        assert_relative_eq!(bbox_iou(&a, &b), 25.0 / 175.0);
        assert_eq!(bbox_iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
    }

    #[test]
    fn test_detect_before_init_is_unavailable() {
        let mut detector = OnnxFaceDetector::new(Path::new("/nonexistent/model.onnx"));
        assert!(!detector.is_loaded());
        assert!(matches!(
            detector.detect(&Frame::solid(10, 10, [0, 0, 0], 0)),
            Err(DetectionError::Unavailable(_))
        ));
    }

    #[test]
    fn test_cpu_target_registers_only_cpu() {
        assert_eq!(ExecutionTarget::Cpu.providers().len(), 1);
        assert!(!ExecutionTarget::Accelerated.providers().is_empty());
        assert_eq!(ExecutionTarget::default(), ExecutionTarget::Accelerated);
    }

    #[test]
    fn test_init_with_missing_model_is_unavailable() {
        let mut detector = OnnxFaceDetector::new(Path::new("/nonexistent/model.onnx"));
        assert!(matches!(detector.init(), Err(DetectionError::Unavailable(_))));
        detector.dispose();
    }
}
