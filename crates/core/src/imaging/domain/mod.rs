pub mod frame_transcoder;
