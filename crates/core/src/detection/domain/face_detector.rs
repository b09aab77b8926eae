use crate::detection::domain::detection_result::DetectedFace;
use crate::shared::error::PreviewError;
use crate::shared::frame::Frame;
use crate::shared::resolution::Resolution;

/// Domain interface for a face detection engine.
///
/// A platform without the capability reports
/// [`PreviewError::DetectorUnavailable`] from `create_session` instead of
/// being reached around.
pub trait FaceDetectionBackend: Send + Sync {
    fn name(&self) -> &str;

    fn create_session(
        &self,
        resolution: Resolution,
        max_faces: usize,
    ) -> Result<Box<dyn DetectorSession>, PreviewError>;
}

/// A detector bound to one resolution and result cap.
///
/// Immutable configuration; a new session is built whenever the preview
/// resolution changes. Stateful implementations are allowed, hence
/// `&mut self`.
pub trait DetectorSession: Send {
    fn resolution(&self) -> Resolution;

    fn max_faces(&self) -> usize;

    /// Returns at most `max_faces()` faces, best first.
    fn detect(&mut self, surface: &Frame) -> Result<Vec<DetectedFace>, PreviewError>;
}
