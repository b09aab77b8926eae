use crate::detection::domain::face_detector::{DetectorSession, FaceDetectionBackend};
use crate::shared::error::PreviewError;
use crate::shared::resolution::Resolution;

/// Stands in for a platform without a face detection engine. Every session
/// request fails with [`PreviewError::DetectorUnavailable`].
pub struct UnsupportedBackend {
    reason: String,
}

impl UnsupportedBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl FaceDetectionBackend for UnsupportedBackend {
    fn name(&self) -> &str {
        "unsupported"
    }

    fn create_session(
        &self,
        _resolution: Resolution,
        _max_faces: usize,
    ) -> Result<Box<dyn DetectorSession>, PreviewError> {
        Err(PreviewError::DetectorUnavailable(self.reason.clone()))
    }
}
