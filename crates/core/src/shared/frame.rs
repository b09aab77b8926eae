use ndarray::ArrayView3;

use crate::shared::error::PreviewError;

/// A decoded pixel surface the face detector consumes: contiguous RGB bytes
/// in row-major order.
///
/// Produced by a transcoder from a camera-native [`RawFrame`] and dropped
/// once the detection pass completes.
///
/// [`RawFrame`]: crate::shared::raw_frame::RawFrame
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    sequence: u64,
}

pub const RGB_CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * RGB_CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            sequence,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
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

    /// Shape is `(height, width, channel)`.
    pub fn as_ndarray(&self) -> Result<ArrayView3<'_, u8>, PreviewError> {
        ArrayView3::from_shape(self.shape(), &self.data).map_err(|e| {
            PreviewError::FrameDecode(format!(
                "{}x{} surface has {} bytes: {e}",
                self.width,
                self.height,
                self.data.len()
            ))
        })
    }

    fn shape(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, RGB_CHANNELS)
    }
}
