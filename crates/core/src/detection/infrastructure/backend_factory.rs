use std::path::PathBuf;

use crate::detection::domain::face_detector::FaceDetectionBackend;
use crate::shared::constants::BLAZEFACE_MODEL_NAME;
use crate::shared::error::PreviewError;
use crate::shared::settings::DetectorSettings;

use super::model_resolver::{self, ProgressFn};
use super::onnx_blazeface_backend::OnnxBlazefaceBackend;

/// Builds the BlazeFace backend described by `settings`.
///
/// Fails with [`PreviewError::DetectorUnavailable`] when no model can be
/// located. Hosts that want to keep the preview running without detection
/// can substitute an `UnsupportedBackend` with the error as its reason.
pub fn create_backend(
    settings: &DetectorSettings,
    progress: Option<ProgressFn>,
) -> Result<Box<dyn FaceDetectionBackend>, PreviewError> {
    let model_path = locate_model(settings, progress)?;
    let backend = OnnxBlazefaceBackend::new(model_path, settings.confidence)?;
    log::info!(
        "Using BlazeFace model {} (confidence={})",
        backend.model_path().display(),
        settings.confidence
    );
    Ok(Box::new(backend))
}

fn locate_model(
    settings: &DetectorSettings,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, PreviewError> {
    if let Some(path) = &settings.model_path {
        return Ok(path.clone());
    }
    log::info!("Resolving model: {BLAZEFACE_MODEL_NAME}");
    let path = model_resolver::resolve(
        BLAZEFACE_MODEL_NAME,
        settings.model_url.as_deref(),
        None,
        progress,
    )?;
    Ok(path)
}
