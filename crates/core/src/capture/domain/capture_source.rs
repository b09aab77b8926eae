use serde::{Deserialize, Serialize};

use crate::shared::error::PreviewError;
use crate::shared::raw_frame::RawFrame;
use crate::shared::resolution::Resolution;

/// One-shot frame callback, invoked on the capture source's own thread.
pub type FrameCallback = Box<dyn FnOnce(RawFrame) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    Front,
    Back,
}

impl std::fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraFacing::Front => write!(f, "front"),
            CameraFacing::Back => write!(f, "back"),
        }
    }
}

/// An opened camera, as issued by a [`CaptureSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraHandle {
    id: u32,
    facing: CameraFacing,
}

impl CameraHandle {
    pub fn new(id: u32, facing: CameraFacing) -> Self {
        Self { id, facing }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }
}

/// Domain port for the platform camera service.
///
/// Methods take `&self` because a source is shared between the layout
/// host, the periodic scheduler and its own capture thread; implementations
/// keep their mutable state behind interior locks.
pub trait CaptureSource: Send + Sync {
    fn open(&self, facing: CameraFacing) -> Result<CameraHandle, PreviewError>;

    fn supported_resolutions(&self, camera: &CameraHandle)
        -> Result<Vec<Resolution>, PreviewError>;

    fn set_resolution(
        &self,
        camera: &CameraHandle,
        resolution: Resolution,
    ) -> Result<(), PreviewError>;

    /// Registers a single-use callback for the next frame. The callback is
    /// dropped by the source after it fires once.
    fn request_one_frame(
        &self,
        camera: &CameraHandle,
        on_frame: FrameCallback,
    ) -> Result<(), PreviewError>;

    fn start_streaming(&self, camera: &CameraHandle) -> Result<(), PreviewError>;

    fn stop_streaming(&self, camera: &CameraHandle);

    /// Releases the camera. Default: no-op.
    fn release(&self, _camera: &CameraHandle) {}
}
