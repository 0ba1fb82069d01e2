pub const FACE_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const FACE_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Detector results are reused for frames sampled within this window (~3 frames at 30 fps).
pub const DEFAULT_CACHE_TTL_MS: u64 = 100;
pub const DEFAULT_CACHE_CAPACITY: usize = 50;
/// Width of the timestamp bucket that forms part of a cache key.
pub const CACHE_KEY_BUCKET_MS: f64 = 100.0;

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.3;
/// Consecutive misses before an identity is dropped (~1 second at 30 fps).
pub const DEFAULT_MAX_SILENT_FRAMES: u32 = 30;

pub const DEFAULT_TARGET_FPS: u32 = 30;
pub const DEFAULT_INTENSITY: u32 = 20;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_LABEL: &str = "ANONYMIZED";

/// Length of the rolling window used to compute `current_fps`.
pub const STATS_WINDOW_MS: f64 = 1000.0;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
