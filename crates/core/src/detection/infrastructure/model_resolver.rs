use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{FACE_MODEL_NAME, FACE_MODEL_URL};

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create model directory {}: {source}", .path.display())]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download of {url} stopped after {received} of {expected} bytes")]
    Incomplete {
        url: String,
        received: u64,
        expected: u64,
    },
    #[error("failed to write model to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine a model directory for this platform")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't send Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

const DOWNLOAD_CHUNK: usize = 1024 * 1024;

/// A downloadable face detection model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaceModel {
    pub file_name: String,
    pub url: String,
}

impl FaceModel {
    pub fn new(file_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            url: url.into(),
        }
    }
}

impl Default for FaceModel {
    /// The YOLO pose model trained on WIDER FACE.
    fn default() -> Self {
        Self::new(FACE_MODEL_NAME, FACE_MODEL_URL)
    }
}

/// Where face models live on disk.
///
/// Lookup order is the writable cache directory, then an optional
/// read-only bundled directory shipped next to the binary. Models that
/// are in neither place are downloaded into the cache. Empty files are
/// treated as missing.
pub struct ModelStore {
    cache_dir: PathBuf,
    bundled_dir: Option<PathBuf>,
}

impl ModelStore {
    /// Store rooted at the platform's per-user model cache.
    pub fn user() -> Result<Self, ModelResolveError> {
        Ok(Self::at(user_model_dir()?))
    }

    pub fn at(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            bundled_dir: None,
        }
    }

    pub fn with_bundled_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundled_dir = Some(dir.into());
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of an already present copy of `model`, without downloading.
    pub fn locate(&self, model: &FaceModel) -> Option<PathBuf> {
        let cached = self.cache_dir.join(&model.file_name);
        if is_usable(&cached) {
            log::debug!("Model {} found in cache", model.file_name);
            return Some(cached);
        }
        let bundled = self.bundled_dir.as_ref()?.join(&model.file_name);
        if is_usable(&bundled) {
            log::debug!("Model {} found at {}", model.file_name, bundled.display());
            return Some(bundled);
        }
        None
    }

    /// Returns a local path for `model`, downloading it if needed.
    pub fn fetch(
        &self,
        model: &FaceModel,
        progress: Option<ProgressFn>,
    ) -> Result<PathBuf, ModelResolveError> {
        if let Some(path) = self.locate(model) {
            return Ok(path);
        }
        fs::create_dir_all(&self.cache_dir).map_err(|source| ModelResolveError::CacheDir {
            path: self.cache_dir.clone(),
            source,
        })?;
        let dest = self.cache_dir.join(&model.file_name);
        log::info!("Downloading model {} from {}", model.file_name, model.url);
        download(&model.url, &dest, progress)?;
        Ok(dest)
    }
}

fn is_usable(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceVeil/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceVeil/models/` or `~/.cache/FaceVeil/models/`
/// - Windows: `%LOCALAPPDATA%/FaceVeil/models/`
pub fn user_model_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join("FaceVeil").join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

/// Streams `url` into `dest.part` and renames on success, so `dest` never
/// holds a partial file.
fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");
    let result = download_to(url, dest, &temp_path, progress);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn download_to(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|source| ModelResolveError::Download {
            url: url.to_string(),
            source,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut file = fs::File::create(temp_path).map_err(|source| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source,
    })?;
    let received = stream_into(&mut response, &mut file, total, progress.as_deref())
        .map_err(|source| ModelResolveError::Write {
            path: temp_path.to_path_buf(),
            source,
        })?;
    drop(file);
    check_complete(url, received, total)?;

    fs::rename(temp_path, dest).map_err(|source| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source,
    })
}

/// Copies `reader` into `writer` chunk by chunk, reporting progress.
/// Returns the number of bytes copied.
fn stream_into(
    reader: &mut impl Read,
    writer: &mut impl Write,
    total: u64,
    progress: Option<&(dyn Fn(u64, u64) + Send)>,
) -> std::io::Result<u64> {
    let mut buf = vec![0u8; DOWNLOAD_CHUNK];
    let mut copied: u64 = 0;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        copied += n as u64;
        if let Some(cb) = progress {
            cb(copied, total);
        }
    }
    writer.flush()?;
    Ok(copied)
}

/// An empty body, or a body shorter than the advertised length, is a
/// failed download.
fn check_complete(url: &str, received: u64, expected: u64) -> Result<(), ModelResolveError> {
    if received == 0 || (expected > 0 && received < expected) {
        return Err(ModelResolveError::Incomplete {
            url: url.to_string(),
            received,
            expected,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const BAD_URL: &str = "http://invalid.nonexistent.example.com/model.onnx";

    fn model() -> FaceModel {
        FaceModel::new("m.onnx", BAD_URL)
    }

    #[test]
    fn test_default_model_is_the_pose_face_model() {
        let model = FaceModel::default();
        assert!(model.file_name.ends_with(".onnx"));
        assert!(model.url.ends_with(&model.file_name));
    }

    #[test]
    fn test_cached_file_wins_over_bundled() {
        let cache = TempDir::new().unwrap();
        let cached = cache.path().join("m.onnx");
        fs::write(&cached, b"cached").unwrap();
        let bundled = TempDir::new().unwrap();
        fs::write(bundled.path().join("m.onnx"), b"bundled").unwrap();

        let store = ModelStore::at(cache.path()).with_bundled_dir(bundled.path());
        assert_eq!(store.fetch(&model(), None).unwrap(), cached);
    }

    #[test]
    fn test_bundled_file_used_when_not_cached() {
        let cache = TempDir::new().unwrap();
        let bundled = TempDir::new().unwrap();
        let bundled_path = bundled.path().join("m.onnx");
        fs::write(&bundled_path, b"bundled").unwrap();

        let store = ModelStore::at(cache.path()).with_bundled_dir(bundled.path());
        assert_eq!(store.locate(&model()), Some(bundled_path));
    }

    #[test]
    fn test_empty_cached_file_is_ignored() {
        let cache = TempDir::new().unwrap();
        fs::write(cache.path().join("m.onnx"), b"").unwrap();
        assert_eq!(ModelStore::at(cache.path()).locate(&model()), None);
    }

    #[test]
    fn test_user_model_dir_is_app_specific() {
        let path = user_model_dir().unwrap();
        assert!(path.ends_with(Path::new("FaceVeil").join("models")));
    }

    #[test]
    fn test_failed_download_leaves_nothing_behind() {
        let cache = TempDir::new().unwrap();
        let store = ModelStore::at(cache.path().join("models"));
        let result = store.fetch(&model(), None);
        assert!(matches!(result, Err(ModelResolveError::Download { .. })));

        let dest = store.cache_dir().join("m.onnx");
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }

    #[test]
    fn test_stream_reports_progress() {
        let body = vec![7u8; 10];
        let mut out = Vec::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let cb: &(dyn Fn(u64, u64) + Send) =
            &move |done, total| log.lock().unwrap().push((done, total));

        let copied = stream_into(&mut Cursor::new(body.clone()), &mut out, 10, Some(cb)).unwrap();
        assert_eq!(copied, 10);
        assert_eq!(out, body);
        assert_eq!(seen.lock().unwrap().last(), Some(&(10, 10)));
    }

    #[test]
    fn test_short_or_empty_body_is_incomplete() {
        assert!(check_complete(BAD_URL, 10, 10).is_ok());
        assert!(check_complete(BAD_URL, 10, 0).is_ok());
        assert!(matches!(
            check_complete(BAD_URL, 4, 10),
            Err(ModelResolveError::Incomplete {
                received: 4,
                expected: 10,
                ..
            })
        ));
        assert!(matches!(
            check_complete(BAD_URL, 0, 0),
            Err(ModelResolveError::Incomplete { .. })
        ));
    }
}
