use std::time::Duration;

/// Faces reported per detection pass.
pub const MAX_FACES: usize = 1;

/// Absolute tolerance between a candidate's aspect ratio and the viewport's.
pub const ASPECT_TOLERANCE: f64 = 0.1;

pub const DEFAULT_DETECTION_INTERVAL: Duration = Duration::from_millis(1000);

/// JPEG quality used for the intermediate compressed frame.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_millis(3000);

/// File name of the BlazeFace short-range model in the model cache.
pub const BLAZEFACE_MODEL_NAME: &str = "blazeface.onnx";

/// Minimum BlazeFace score for a face to be reported.
pub const DEFAULT_DETECTION_CONFIDENCE: f32 = 0.5;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const SETTINGS_DIR_NAME: &str = "Busceni";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const MODELS_DIR_NAME: &str = "models";
