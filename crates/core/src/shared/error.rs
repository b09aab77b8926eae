use thiserror::Error;

/// Failure taxonomy shared by every stage of the preview pipeline.
///
/// Inside a detection cycle none of these reach the listener: the cycle is
/// abandoned, the condition logged, and the next tick starts fresh.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreviewError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),
    #[error("frame decode failed: {0}")]
    FrameDecode(String),
    #[error("detector unavailable: {0}")]
    DetectorUnavailable(String),
    #[error("settings error: {0}")]
    Config(String),
    #[error("failed to start thread {0}")]
    ThreadSpawn(String),
}

impl PreviewError {
    /// Whether a cycle hitting this error should simply be skipped.
    pub fn aborts_cycle(&self) -> bool {
        matches!(
            self,
            PreviewError::FrameDecode(_) | PreviewError::DetectorUnavailable(_)
        )
    }
}
