use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};

use crate::imaging::domain::frame_transcoder::FrameTranscoder;
use crate::shared::constants::DEFAULT_JPEG_QUALITY;
use crate::shared::error::PreviewError;
use crate::shared::frame::Frame;
use crate::shared::nv21::nv21_to_rgb;
use crate::shared::raw_frame::{PixelFormat, RawFrame};

/// Re-encodes the camera frame as JPEG, then decodes it back into an RGB
/// surface.
///
/// Costs one CPU encode/decode per cycle. In exchange, no detector ever
/// sees camera-native chroma.
pub struct JpegRoundTripTranscoder {
    quality: u8,
}

impl JpegRoundTripTranscoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    fn compress(&self, raw: &RawFrame) -> Result<Vec<u8>, PreviewError> {
        let rgb = match raw.format() {
            PixelFormat::Nv21 => nv21_to_rgb(raw.data(), raw.width(), raw.height()),
        };
        let image = RgbImage::from_raw(raw.width(), raw.height(), rgb)
            .ok_or_else(|| PreviewError::FrameDecode("RGB buffer does not fit frame".into()))?;

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode_image(&image)
            .map_err(|e| PreviewError::FrameDecode(format!("JPEG encode: {e}")))?;
        Ok(jpeg)
    }
}

impl Default for JpegRoundTripTranscoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameTranscoder for JpegRoundTripTranscoder {
    fn transcode(&self, raw: &RawFrame) -> Result<Frame, PreviewError> {
        raw.validate()?;
        let jpeg = self.compress(raw)?;
        if jpeg.is_empty() {
            return Err(PreviewError::FrameDecode("JPEG encoder produced no bytes".into()));
        }

        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
            .map_err(|e| PreviewError::FrameDecode(format!("JPEG decode: {e}")))?
            .to_rgb8();
        let (w, h) = decoded.dimensions();
        Ok(Frame::new(decoded.into_raw(), w, h, raw.sequence()))
    }
}
