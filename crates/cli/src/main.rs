use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use busceni_core::capture::domain::capture_source::CaptureSource;
use busceni_core::capture::infrastructure::image_file_capture_source::ImageFileCaptureSource;
use busceni_core::capture::infrastructure::synthetic_capture_source::SyntheticCaptureSource;
use busceni_core::capture::infrastructure::synthetic_scene::SyntheticScene;
use busceni_core::detection::domain::detection_result::DetectionResult;
use busceni_core::detection::domain::face_detector::FaceDetectionBackend;
use busceni_core::detection::infrastructure::backend_factory::create_backend;
use busceni_core::imaging::infrastructure::transcoder_factory::create_transcoder;
use busceni_core::overlay::eye_overlay::{eye_markers, EyeOverlay, OverlayStyle};
use busceni_core::pipeline::detection_listener::DetectionListener;
use busceni_core::pipeline::display_dispatcher::DisplayLoop;
use busceni_core::pipeline::frame_detection_pipeline::{
    FrameDetectionPipeline, PipelineConfig, TriggerOutcome,
};
use busceni_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use busceni_core::preview::domain::size_selector::PreviewSizeSelector;
use busceni_core::shared::constants::IMAGE_EXTENSIONS;
use busceni_core::shared::resolution::{Resolution, Viewport};
use busceni_core::shared::settings::{Settings, TranscodeMode};

const DETECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Camera preview sizing and face detection.
#[derive(Parser)]
#[command(name = "busceni", version)]
struct Cli {
    /// Settings file to use instead of the per-user one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// BlazeFace ONNX model to use instead of the cached one.
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the preview size chosen for a viewport.
    SelectSize {
        /// Supported sizes, comma-separated (e.g. 1920x1080,1280x720).
        #[arg(long, value_delimiter = ',', required = true)]
        sizes: Vec<Resolution>,

        /// Viewport as WIDTHxHEIGHT.
        #[arg(long)]
        viewport: Viewport,

        /// Aspect ratio tolerance (defaults to the settings value).
        #[arg(long)]
        tolerance: Option<f64>,
    },

    /// Run one detection cycle over an image file.
    Detect {
        /// Input image file.
        image: PathBuf,

        /// Viewport as WIDTHxHEIGHT (defaults to the image size).
        #[arg(long)]
        viewport: Option<Viewport>,

        /// Skip the JPEG round trip.
        #[arg(long)]
        direct: bool,
    },

    /// Run periodic detection over a looping still image or the
    /// synthetic camera.
    Run {
        /// Image the camera keeps serving (defaults to the synthetic scene).
        #[arg(long)]
        image: Option<PathBuf>,

        /// How long to run.
        #[arg(long, default_value = "10")]
        duration_secs: u64,

        /// Detection interval (defaults to the settings value).
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Render an empty scene instead of a face.
        #[arg(long)]
        no_face: bool,

        /// Viewport as WIDTHxHEIGHT.
        #[arg(long, default_value = "1280x720")]
        viewport: Viewport,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        settings.detector.model_path = Some(model);
    }

    match cli.command {
        Command::SelectSize {
            sizes,
            viewport,
            tolerance,
        } => {
            let tolerance = tolerance.unwrap_or(settings.aspect_tolerance);
            let chosen = PreviewSizeSelector::new(tolerance).select(&sizes, viewport)?;
            println!("{chosen}");
        }
        Command::Detect {
            image,
            viewport,
            direct,
        } => run_detect(&settings, &image, viewport, direct)?,
        Command::Run {
            image,
            duration_secs,
            interval_ms,
            no_face,
            viewport,
        } => {
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| settings.detection_interval());
            let camera: Arc<dyn CaptureSource> = match image {
                Some(image) => {
                    validate_image(&image)?;
                    Arc::new(ImageFileCaptureSource::open_path(&image)?)
                }
                None if no_face => Arc::new(SyntheticCaptureSource::new(SyntheticScene::Blank)?),
                None => Arc::new(SyntheticCaptureSource::new(SyntheticScene::Face)?),
            };
            run_live(
                &settings,
                camera,
                viewport,
                interval,
                Duration::from_secs(duration_secs),
            )?;
        }
    }

    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<Settings, Box<dyn std::error::Error>> {
    let settings = match path {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };
    settings.validate()?;
    Ok(settings)
}

fn run_detect(
    settings: &Settings,
    image: &Path,
    viewport: Option<Viewport>,
    direct: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    validate_image(image)?;
    let camera = Arc::new(ImageFileCaptureSource::open_path(image)?);
    let native = camera.native_resolution();
    let viewport = viewport.unwrap_or(Viewport::new(native.width(), native.height()));
    let mode = if direct {
        TranscodeMode::Direct
    } else {
        settings.transcode
    };

    let display = DisplayLoop::new();
    let pipeline = FrameDetectionPipeline::new(
        camera,
        create_transcoder(mode, settings.jpeg_quality),
        build_backend(settings)?,
        display.handle(),
        PipelineConfig::from_settings(settings),
    )?;
    let delivered: Arc<Mutex<Option<DetectionResult>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&delivered);
    pipeline.set_listener(Arc::new(move |result: &DetectionResult| {
        if let Ok(mut slot) = sink.lock() {
            *slot = Some(result.clone());
        }
    }));

    pipeline.open(settings.camera_facing)?;
    let size = pipeline.layout(viewport)?;
    pipeline.start_preview()?;
    log::info!("Detecting in {} at {size}", image.display());

    match pipeline.request_detection() {
        TriggerOutcome::Started => {}
        TriggerOutcome::Dropped(state) => {
            return Err(format!("Detection busy ({state:?})").into());
        }
        TriggerOutcome::Failed(e) => return Err(e.into()),
    }
    if !display.run_while_pending(DETECT_TIMEOUT, || pipeline.state().is_idle()) {
        return Err("Detection timed out".into());
    }

    let result = delivered.lock().ok().and_then(|mut slot| slot.take());
    match result {
        Some(result) => {
            print_result(&result, viewport, &settings.overlay);
            Ok(())
        }
        None => Err("Detection cycle was skipped (run with RUST_LOG=warn for details)".into()),
    }
}

fn run_live(
    settings: &Settings,
    camera: Arc<dyn CaptureSource>,
    viewport: Viewport,
    interval: Duration,
    duration: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let display = DisplayLoop::new();
    let pipeline = FrameDetectionPipeline::new(
        camera,
        create_transcoder(settings.transcode, settings.jpeg_quality),
        build_backend(settings)?,
        display.handle(),
        PipelineConfig::from_settings(settings),
    )?;
    pipeline.set_logger(Box::new(StdoutPipelineLogger::default()));

    let overlay = Arc::new(EyeOverlay::new(
        settings.overlay.clone(),
        viewport,
        Box::new(|| log::debug!("Redraw requested")),
    ));
    let forward = Arc::clone(&overlay);
    let style = settings.overlay.clone();
    pipeline.set_listener(Arc::new(move |result: &DetectionResult| {
        print_result(result, viewport, &style);
        forward.on_detection(result);
    }));

    pipeline.open(settings.camera_facing)?;
    let size = pipeline.layout(viewport)?;
    pipeline.start_preview()?;
    log::info!("Camera at {size}, running for {duration:?}");

    pipeline.start_detection(interval)?;
    display.run_until(Instant::now() + duration);
    pipeline.stop_detection();
    pipeline.stop_preview();
    display.run_pending();

    println!("Overlay holds {} eye markers", overlay.markers().len());
    Ok(())
}

fn build_backend(
    settings: &Settings,
) -> Result<Box<dyn FaceDetectionBackend>, Box<dyn std::error::Error>> {
    create_backend(&settings.detector, Some(Box::new(download_progress))).map_err(|e| {
        format!("{e} (pass --model or set detector.model_path / detector.model_url in settings)")
            .into()
    })
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}

fn print_result(result: &DetectionResult, viewport: Viewport, style: &OverlayStyle) {
    println!(
        "Frame {} ({}): {} face(s)",
        result.sequence(),
        result.resolution(),
        result.len()
    );
    for (i, face) in result.faces().iter().enumerate() {
        let (left, right) = (face.left_eye(), face.right_eye());
        let bounds = face.bounds();
        println!(
            "  face {i}: left eye ({:.1}, {:.1})  right eye ({:.1}, {:.1})  distance {:.1}  confidence {:.2}",
            left.x,
            left.y,
            right.x,
            right.y,
            face.eyes_distance(),
            face.confidence()
        );
        println!(
            "          box ({:.0}, {:.0}) {:.0}x{:.0}",
            bounds.x, bounds.y, bounds.width, bounds.height
        );
    }
    for marker in eye_markers(result, viewport, style) {
        log::debug!(
            "Marker at ({:.1}, {:.1}) on {viewport}",
            marker.center.x,
            marker.center.y
        );
    }
}

fn validate_image(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("Input file not found: {}", path.display()).into());
    }
    if !is_image(path) {
        return Err(format!(
            "Unsupported image type: {} (expected one of {})",
            path.display(),
            IMAGE_EXTENSIONS.join(", ")
        )
        .into());
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
