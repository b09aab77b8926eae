use crate::shared::error::PreviewError;
use crate::shared::frame::Frame;
use crate::shared::raw_frame::RawFrame;

/// Converts a camera-native frame into the RGB surface the detector reads.
///
/// Runs on the detection worker, never on the capture or display thread.
/// Any failure is reported as [`PreviewError::FrameDecode`].
pub trait FrameTranscoder: Send + Sync {
    fn transcode(&self, raw: &RawFrame) -> Result<Frame, PreviewError>;
}
