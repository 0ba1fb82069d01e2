use ndarray::ArrayView3;

/// A frame whose buffer does not describe a usable image.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame {index} has no pixels ({width}x{height})")]
    Empty { index: usize, width: u32, height: u32 },
    #[error("frame {index} has {channels} channels, expected 3 or 4")]
    Channels { index: usize, channels: u8 },
    #[error("frame {index} holds {actual} bytes, its dimensions need {expected}")]
    Length {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

/// One raster frame pulled from a frame source: interleaved 8-bit pixels
/// (RGB or RGBA) in row-major order.
///
/// `index` is the source's sequence number and doubles as the frame's
/// identity for replayed detections.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    /// Wraps `data` as-is. Frames from outside the crate should pass
    /// [`Frame::validate`] before their pixels are touched.
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// A frame filled with a single RGB color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3], index: usize) -> Self {
        let pixels = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        Self::new(data, width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Byte offset of pixel `(x, y)`, or `None` outside the frame.
    pub fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(((y as usize) * (self.width as usize) + x as usize) * self.channels as usize)
    }

    /// Channel values of pixel `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        let start = self.offset(x, y)?;
        Some(&self.data[start..start + self.channels as usize])
    }

    /// Checks for non-zero dimensions, RGB or RGBA layout and a buffer of
    /// exactly `width * height * channels` bytes.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::Empty {
                index: self.index,
                width: self.width,
                height: self.height,
            });
        }
        if !matches!(self.channels, 3 | 4) {
            return Err(FrameError::Channels {
                index: self.index,
                channels: self.channels,
            });
        }
        let (h, w, c) = self.shape();
        let expected = h * w * c;
        if self.data.len() != expected {
            return Err(FrameError::Length {
                index: self.index,
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn as_ndarray(&self) -> Result<ArrayView3<'_, u8>, FrameError> {
        self.validate()?;
        let (h, w, c) = self.shape();
        ArrayView3::from_shape((h, w, c), &self.data).map_err(|_| FrameError::Length {
            index: self.index,
            expected: h * w * c,
            actual: self.data.len(),
        })
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
