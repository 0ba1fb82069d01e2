use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::effects::domain::region_effect::AnonymizationMode;
use crate::effects::infrastructure::label_font::FontError;
use crate::shared::constants::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_MS, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_INTENSITY,
    DEFAULT_LABEL, DEFAULT_MATCH_THRESHOLD, DEFAULT_MAX_SILENT_FRAMES, DEFAULT_TARGET_FPS,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Font(#[from] FontError),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Every tunable of the anonymization pipeline.
///
/// Missing keys in a JSON file fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnonymizerConfig {
    pub anonymization_mode: AnonymizationMode,
    pub intensity: u32,
    pub detection_confidence_threshold: f64,
    pub target_fps: u32,
    pub match_threshold: f64,
    pub max_silent_frames: u32,
    pub cache_ttl_ms: u64,
    pub cache_capacity: usize,
    pub label: String,
    /// TrueType/OpenType file for black-box labels; built-in glyphs if unset.
    pub label_font: Option<PathBuf>,
}

impl Default for AnonymizerConfig {
    fn default() -> Self {
        Self {
            anonymization_mode: AnonymizationMode::default(),
            intensity: DEFAULT_INTENSITY,
            detection_confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            target_fps: DEFAULT_TARGET_FPS,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            max_silent_frames: DEFAULT_MAX_SILENT_FRAMES,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            label: DEFAULT_LABEL.to_string(),
            label_font: None,
        }
    }
}

impl AnonymizerConfig {
    /// `<config dir>/FaceVeil/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceVeil").join("config.json"))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.intensity == 0 {
            return Err(ConfigError::invalid("intensity", "must be at least 1"));
        }
        let threshold = self.detection_confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::invalid(
                "detectionConfidenceThreshold",
                format!("{threshold} is outside [0, 1]"),
            ));
        }
        if self.target_fps == 0 {
            return Err(ConfigError::invalid("targetFps", "must be at least 1"));
        }
        if !(self.match_threshold.is_finite() && self.match_threshold > 0.0) {
            return Err(ConfigError::invalid(
                "matchThreshold",
                format!("{} must be a positive number", self.match_threshold),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::invalid("cacheCapacity", "must be at least 1"));
        }
        Ok(())
    }

    /// Milliseconds between accepted frames at the target rate.
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.target_fps.max(1) as f64
    }
}
