pub mod direct_transcoder;
pub mod jpeg_round_trip_transcoder;
pub mod transcoder_factory;
