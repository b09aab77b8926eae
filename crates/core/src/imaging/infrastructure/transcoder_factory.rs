use crate::imaging::domain::frame_transcoder::FrameTranscoder;
use crate::shared::settings::TranscodeMode;

use super::direct_transcoder::DirectTranscoder;
use super::jpeg_round_trip_transcoder::JpegRoundTripTranscoder;

/// Builds the transcoder selected in settings.
pub fn create_transcoder(mode: TranscodeMode, jpeg_quality: u8) -> Box<dyn FrameTranscoder> {
    log::info!("Using {mode} frame transcoding (jpeg_quality={jpeg_quality})");
    match mode {
        TranscodeMode::Jpeg => Box::new(JpegRoundTripTranscoder::new(jpeg_quality)),
        TranscodeMode::Direct => Box::new(DirectTranscoder),
    }
}
