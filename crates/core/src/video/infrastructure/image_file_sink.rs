use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::video::domain::frame_sink::{FrameSink, SinkError};

/// Saves presented frames as numbered image snapshots.
///
/// With `every = N > 0`, every N-th presented frame is written as
/// `frame_<index>.<ext>`. With `every = 0`, only the most recent frame is
/// kept and written as `last.<ext>` on [`FrameSink::finish`].
pub struct ImageFileSink {
    dir: PathBuf,
    extension: String,
    every: usize,
    presented: usize,
    written: usize,
    last: Option<Frame>,
}

impl ImageFileSink {
    pub fn new(dir: &Path, every: usize) -> Result<Self, SinkError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            extension: "png".into(),
            every,
            presented: 0,
            written: 0,
            last: None,
        })
    }

    /// Output format is inferred from the extension (`png`, `jpg`, ...).
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn written(&self) -> usize {
        self.written
    }

    fn write(&mut self, path: &Path, frame: &Frame) -> Result<(), SinkError> {
        let write_err = |reason: String| SinkError::Write {
            index: frame.index(),
            reason,
        };
        let img = match frame.channels() {
            3 => image::DynamicImage::ImageRgb8(
                image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
                    .ok_or_else(|| write_err("frame buffer does not match its dimensions".into()))?,
            ),
            4 => image::DynamicImage::ImageRgba8(
                image::RgbaImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
                    .ok_or_else(|| write_err("frame buffer does not match its dimensions".into()))?,
            ),
            other => return Err(write_err(format!("unsupported channel count {other}"))),
        };
        // JPEG has no alpha channel.
        let img = if matches!(self.extension.as_str(), "jpg" | "jpeg") {
            image::DynamicImage::ImageRgb8(img.to_rgb8())
        } else {
            img
        };
        img.save(path).map_err(|e| write_err(e.to_string()))?;
        self.written += 1;
        log::debug!("Wrote {}", path.display());
        Ok(())
    }
}

impl FrameSink for ImageFileSink {
    fn present(&mut self, frame: &Frame) -> Result<(), SinkError> {
        self.presented += 1;
        if self.every == 0 {
            self.last = Some(frame.clone());
            return Ok(());
        }
        if (self.presented - 1) % self.every != 0 {
            return Ok(());
        }
        let path = self
            .dir
            .join(format!("frame_{:06}.{}", frame.index(), self.extension));
        self.write(&path, frame)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if let Some(frame) = self.last.take() {
            let path = self.dir.join(format!("last.{}", self.extension));
            self.write(&path, &frame)?;
        }
        log::info!(
            "Wrote {} of {} frames to {}",
            self.written(),
            self.presented,
            self.dir.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_every_frame_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageFileSink::new(dir.path(), 1).unwrap();
        for i in 0..3 {
            sink.present(&Frame::solid(4, 4, [i as u8, 0, 0], i)).unwrap();
        }
        sink.finish().unwrap();
        assert_eq!(sink.written(), 3);
        assert!(dir.path().join("frame_000002.png").exists());
    }

    #[test]
    fn test_every_nth_frame_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageFileSink::new(dir.path(), 3).unwrap();
        for i in 0..7 {
            sink.present(&Frame::solid(4, 4, [0, 0, 0], i)).unwrap();
        }
        // presented 1st, 4th and 7th
        assert_eq!(count_files(dir.path()), 3);
        assert!(dir.path().join("frame_000003.png").exists());
    }

    #[test]
    fn test_zero_keeps_only_last_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageFileSink::new(dir.path(), 0).unwrap();
        sink.present(&Frame::solid(4, 4, [1, 1, 1], 0)).unwrap();
        sink.present(&Frame::solid(4, 4, [200, 100, 50], 1)).unwrap();
        assert_eq!(count_files(dir.path()), 0);

        sink.finish().unwrap();
        let img = image::open(dir.path().join("last.png")).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [200, 100, 50]);
    }

    #[test]
    fn test_rgba_frame_saved_as_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageFileSink::new(dir.path(), 1).unwrap().with_extension(".jpg");
        let frame = Frame::new(vec![128u8; 4 * 4 * 4], 4, 4, 4, 9);
        sink.present(&frame).unwrap();
        assert!(dir.path().join("frame_000009.jpg").exists());
    }

    #[test]
    fn test_creates_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ImageFileSink::new(&nested, 1).unwrap();
        assert!(nested.is_dir());
    }
}
