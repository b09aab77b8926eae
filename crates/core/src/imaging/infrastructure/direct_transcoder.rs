use crate::imaging::domain::frame_transcoder::FrameTranscoder;
use crate::shared::error::PreviewError;
use crate::shared::frame::Frame;
use crate::shared::nv21::nv21_to_rgb;
use crate::shared::raw_frame::{PixelFormat, RawFrame};

/// Converts NV21 straight to RGB, skipping the compressed hop.
pub struct DirectTranscoder;

impl FrameTranscoder for DirectTranscoder {
    fn transcode(&self, raw: &RawFrame) -> Result<Frame, PreviewError> {
        raw.validate()?;
        let rgb = match raw.format() {
            PixelFormat::Nv21 => nv21_to_rgb(raw.data(), raw.width(), raw.height()),
        };
        Ok(Frame::new(rgb, raw.width(), raw.height(), raw.sequence()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::nv21::gray_to_nv21;
    use crate::shared::resolution::Resolution;

    #[test]
    fn test_converts_gray_frame() {
        let res = Resolution::new(4, 2).unwrap();
        let raw = RawFrame::new(gray_to_nv21(&[90; 8], 4, 2), PixelFormat::Nv21, res, 7);

        let frame = DirectTranscoder.transcode(&raw).unwrap();

        assert_eq!((frame.width(), frame.height(), frame.sequence()), (4, 2, 7));
        assert!(frame.data().iter().all(|&c| c == 90));
    }

    #[test]
    fn test_empty_frame_fails() {
        let res = Resolution::new(4, 2).unwrap();
        let raw = RawFrame::new(Vec::new(), PixelFormat::Nv21, res, 0);
        assert!(matches!(
            DirectTranscoder.transcode(&raw),
            Err(PreviewError::FrameDecode(_))
        ));
    }
}
