use crate::shared::error::PreviewError;
use crate::shared::resolution::Resolution;

/// Pixel layouts a camera can hand back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Full-resolution Y plane followed by interleaved V/U samples at half
    /// resolution on both axes.
    Nv21,
}

impl PixelFormat {
    /// Buffer length in bytes for a frame of the given size.
    pub fn frame_len(&self, width: u32, height: u32) -> usize {
        match self {
            PixelFormat::Nv21 => {
                let w = width as usize;
                let h = height as usize;
                w * h + 2 * w.div_ceil(2) * h.div_ceil(2)
            }
        }
    }
}

/// One captured camera image, immutable once captured.
///
/// Its dimensions are those of the resolution selected when the frame was
/// requested. The buffer is not checked on construction: a camera may hand
/// back an empty or truncated buffer, and [`RawFrame::validate`] is where
/// the pipeline finds out.
#[derive(Clone, Debug)]
pub struct RawFrame {
    data: Vec<u8>,
    format: PixelFormat,
    width: u32,
    height: u32,
    sequence: u64,
}

impl RawFrame {
    pub fn new(data: Vec<u8>, format: PixelFormat, resolution: Resolution, sequence: u64) -> Self {
        Self {
            data,
            format,
            width: resolution.width(),
            height: resolution.height(),
            sequence,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn expected_len(&self) -> usize {
        self.format.frame_len(self.width, self.height)
    }

    pub fn validate(&self) -> Result<(), PreviewError> {
        if self.data.is_empty() {
            return Err(PreviewError::FrameDecode("no image data".into()));
        }
        let expected = self.expected_len();
        if self.data.len() != expected {
            return Err(PreviewError::FrameDecode(format!(
                "{:?} frame {}x{} needs {expected} bytes, got {}",
                self.format,
                self.width,
                self.height,
                self.data.len()
            )));
        }
        Ok(())
    }
}
