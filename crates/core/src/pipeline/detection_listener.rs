use crate::detection::domain::detection_result::DetectionResult;

/// Receives each completed detection pass.
///
/// Always invoked on the display-owning thread. Never invoked for a cycle
/// that aborted.
pub trait DetectionListener: Send + Sync {
    fn on_detection(&self, result: &DetectionResult);
}

impl<F> DetectionListener for F
where
    F: Fn(&DetectionResult) + Send + Sync,
{
    fn on_detection(&self, result: &DetectionResult) {
        self(result)
    }
}
