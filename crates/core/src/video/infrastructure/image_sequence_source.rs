use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{FrameSource, SourceError};

/// Serves still images as a frame stream, decoding one file per frame.
///
/// Frame indices keep counting across loops so downstream consumers see a
/// strictly increasing sequence.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    cursor: usize,
    next_index: usize,
    looping: bool,
}

impl ImageSequenceSource {
    pub fn new(paths: Vec<PathBuf>, looping: bool) -> Result<Self, SourceError> {
        if paths.is_empty() {
            return Err(SourceError::Empty("input list".into()));
        }
        Ok(Self {
            paths,
            cursor: 0,
            next_index: 0,
            looping,
        })
    }

    /// Expands directories into their image files (sorted by name) and
    /// keeps plain files as given.
    pub fn from_inputs(inputs: &[PathBuf], looping: bool) -> Result<Self, SourceError> {
        let mut paths = Vec::new();
        for input in inputs {
            if input.is_dir() {
                paths.extend(list_images(input)?);
            } else {
                paths.push(input.clone());
            }
        }
        if paths.is_empty() {
            let names: Vec<_> = inputs.iter().map(|p| p.display().to_string()).collect();
            return Err(SourceError::Empty(names.join(", ")));
        }
        Self::new(paths, looping)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let io_err = |source: std::io::Error| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && is_image_file(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn load_rgb(path: &Path, index: usize) -> Result<Frame, SourceError> {
    let img = image::open(path)
        .map_err(|source| SourceError::Decode {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height, 3, index))
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.cursor >= self.paths.len() {
            if !self.looping {
                return Ok(None);
            }
            self.cursor = 0;
        }
        let path = &self.paths[self.cursor];
        self.cursor += 1;
        let index = self.next_index;
        self.next_index += 1;
        load_rgb(path, index).map(Some)
    }
}
