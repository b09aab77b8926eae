//! Full cycles through the public API: software camera → JPEG round trip →
//! eye-pair detection → listener on the display thread.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use busceni_core::capture::domain::capture_source::{CameraFacing, CaptureSource};
use busceni_core::capture::infrastructure::image_file_capture_source::ImageFileCaptureSource;
use busceni_core::capture::infrastructure::synthetic_capture_source::SyntheticCaptureSource;
use busceni_core::capture::infrastructure::synthetic_scene::{
    render_luma, render_nv21, FaceLayout, SyntheticScene,
};
use busceni_core::detection::domain::detection_result::DetectionResult;
use busceni_core::detection::domain::face_detector::FaceDetectionBackend;
use busceni_core::detection::infrastructure::eye_pair_detector::EyePairBackend;
use busceni_core::imaging::domain::frame_transcoder::FrameTranscoder;
use busceni_core::imaging::infrastructure::jpeg_round_trip_transcoder::JpegRoundTripTranscoder;
use busceni_core::imaging::infrastructure::transcoder_factory::create_transcoder;
use busceni_core::overlay::eye_overlay::{EyeOverlay, OverlayStyle};
use busceni_core::pipeline::display_dispatcher::DisplayLoop;
use busceni_core::pipeline::frame_detection_pipeline::{
    FrameDetectionPipeline, PipelineConfig, TriggerOutcome,
};
use busceni_core::shared::raw_frame::{PixelFormat, RawFrame};
use busceni_core::shared::resolution::{Resolution, Viewport};
use busceni_core::shared::settings::{Settings, TranscodeMode};

const WAIT: Duration = Duration::from_secs(20);

fn hd() -> Resolution {
    Resolution::new(1280, 720).unwrap()
}

fn raw(scene: SyntheticScene, sequence: u64) -> RawFrame {
    RawFrame::new(render_nv21(scene, hd(), sequence), PixelFormat::Nv21, hd(), sequence)
}

#[test]
fn synthetic_face_at_720p_yields_one_face() {
    let transcoder = JpegRoundTripTranscoder::default();
    let mut session = EyePairBackend.create_session(hd(), 1).unwrap();

    let surface = transcoder.transcode(&raw(SyntheticScene::Face, 5)).unwrap();
    let faces = session.detect(&surface).unwrap();

    assert_eq!(faces.len(), 1);
    let layout = FaceLayout::for_frame(1280, 720, 5);
    let face = &faces[0];
    assert!(face.left_eye().distance(&layout.left_eye) < 3.0);
    assert!(face.right_eye().distance(&layout.right_eye) < 3.0);
    assert!((face.eyes_distance() - layout.eyes_distance()).abs() < 4.0);
    assert!(face.confidence() > 0.5 && face.confidence() <= 1.0);
    assert!(face.bounds().contains(&layout.center));
}

#[test]
fn blank_frame_at_720p_yields_no_faces() {
    let transcoder = JpegRoundTripTranscoder::default();
    let mut session = EyePairBackend.create_session(hd(), 1).unwrap();

    let surface = transcoder.transcode(&raw(SyntheticScene::Blank, 0)).unwrap();
    assert!(session.detect(&surface).unwrap().is_empty());
}

#[test]
fn periodic_pipeline_feeds_overlay_on_display_thread() {
    let display = DisplayLoop::new();
    let settings = Settings::default();
    let camera = Arc::new(SyntheticCaptureSource::new(SyntheticScene::Face).unwrap());
    let pipeline = FrameDetectionPipeline::new(
        camera.clone(),
        create_transcoder(settings.transcode, settings.jpeg_quality),
        Box::new(EyePairBackend),
        display.handle(),
        PipelineConfig::from_settings(&settings),
    )
    .unwrap();

    let viewport = Viewport::new(1280, 720);
    let redraws = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&redraws);
    let context = display.context_id();
    let overlay = Arc::new(EyeOverlay::new(
        settings.overlay.clone(),
        viewport,
        Box::new(move || sink.lock().unwrap().push(std::thread::current().id())),
    ));
    pipeline.set_listener(overlay.clone());

    pipeline.open(settings.camera_facing).unwrap();
    assert_eq!(pipeline.layout(viewport).unwrap(), hd());
    pipeline.start_preview().unwrap();
    pipeline.start_detection(Duration::from_millis(20)).unwrap();

    assert!(display.run_while_pending(WAIT, || redraws.lock().unwrap().len() >= 2));
    pipeline.stop_detection();

    assert!(redraws.lock().unwrap().iter().all(|&id| id == context));
    let markers = overlay.markers();
    assert_eq!(markers.len(), 2);
    assert_eq!(markers[0].color, OverlayStyle::default().eye_color);
    assert!(camera.frames_rendered() >= 2);
}

#[test]
fn still_image_camera_detects_face_in_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("face.png");
    let (w, h) = (640, 480);
    let luma = render_luma(SyntheticScene::Face, w, h, 0);
    image::GrayImage::from_raw(w, h, luma)
        .unwrap()
        .save(&path)
        .unwrap();

    let camera = Arc::new(ImageFileCaptureSource::open_path(&path).unwrap());
    let display = DisplayLoop::new();
    let pipeline = FrameDetectionPipeline::new(
        camera.clone(),
        create_transcoder(TranscodeMode::Direct, 80),
        Box::new(EyePairBackend),
        display.handle(),
        PipelineConfig::default(),
    )
    .unwrap();
    let results: Arc<Mutex<Vec<DetectionResult>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);
    pipeline.set_listener(Arc::new(move |result: &DetectionResult| {
        sink.lock().unwrap().push(result.clone());
    }));

    pipeline.open(CameraFacing::Back).unwrap();
    pipeline.layout(Viewport::new(w, h)).unwrap();
    pipeline.start_preview().unwrap();
    assert_eq!(pipeline.request_detection(), TriggerOutcome::Started);

    assert!(display.run_while_pending(WAIT, || !results.lock().unwrap().is_empty()));
    let results = results.lock().unwrap();
    assert_eq!(results[0].len(), 1);
    assert_eq!(results[0].resolution(), camera.native_resolution());
    let handle = pipeline.camera().unwrap();
    assert!(camera.supported_resolutions(&handle).unwrap().len() >= 2);
}
