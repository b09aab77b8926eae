use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::capture::domain::capture_source::{
    CameraFacing, CameraHandle, CaptureSource, FrameCallback,
};
use crate::shared::error::PreviewError;
use crate::shared::job_thread::JobThread;
use crate::shared::raw_frame::{PixelFormat, RawFrame};
use crate::shared::resolution::Resolution;
use crate::shared::sync::lock;

use super::synthetic_scene::{render_nv21, SyntheticScene};

/// Sizes a typical phone camera advertises, largest first.
pub const DEFAULT_RESOLUTIONS: &[(u32, u32)] = &[
    (1920, 1080),
    (1280, 720),
    (960, 720),
    (800, 480),
    (640, 480),
    (352, 288),
    (176, 144),
];

#[derive(Default)]
struct CameraState {
    resolution: Option<Resolution>,
    streaming: bool,
}

/// A software camera that renders a procedural scene in NV21.
///
/// Frames are rendered and delivered on a dedicated capture thread, the same
/// way a platform camera service calls back from its own context.
pub struct SyntheticCaptureSource {
    resolutions: Vec<Resolution>,
    scene: Mutex<SyntheticScene>,
    cameras: Mutex<HashMap<u32, CameraState>>,
    next_id: AtomicU32,
    sequence: AtomicU64,
    thread: JobThread,
}

impl SyntheticCaptureSource {
    pub fn new(scene: SyntheticScene) -> Result<Self, PreviewError> {
        let resolutions = DEFAULT_RESOLUTIONS
            .iter()
            .map(|&(w, h)| Resolution::new(w, h))
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_resolutions(scene, resolutions)
    }

    pub fn with_resolutions(
        scene: SyntheticScene,
        resolutions: Vec<Resolution>,
    ) -> Result<Self, PreviewError> {
        let thread = JobThread::spawn("synthetic-capture")?;
        Ok(Self {
            resolutions,
            scene: Mutex::new(scene),
            cameras: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(0),
            sequence: AtomicU64::new(0),
            thread,
        })
    }

    pub fn set_scene(&self, scene: SyntheticScene) {
        *lock(&self.scene) = scene;
    }

    pub fn frames_rendered(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    fn with_camera<T>(
        &self,
        camera: &CameraHandle,
        f: impl FnOnce(&mut CameraState) -> Result<T, PreviewError>,
    ) -> Result<T, PreviewError> {
        let mut cameras = lock(&self.cameras);
        let state = cameras.get_mut(&camera.id()).ok_or_else(|| {
            PreviewError::CaptureUnavailable(format!("camera {} is not open", camera.id()))
        })?;
        f(state)
    }
}

impl CaptureSource for SyntheticCaptureSource {
    fn open(&self, facing: CameraFacing) -> Result<CameraHandle, PreviewError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.cameras).insert(id, CameraState::default());
        log::debug!("Opened synthetic {facing} camera {id}");
        Ok(CameraHandle::new(id, facing))
    }

    fn supported_resolutions(
        &self,
        camera: &CameraHandle,
    ) -> Result<Vec<Resolution>, PreviewError> {
        self.with_camera(camera, |_| Ok(self.resolutions.clone()))
    }

    fn set_resolution(
        &self,
        camera: &CameraHandle,
        resolution: Resolution,
    ) -> Result<(), PreviewError> {
        if !self.resolutions.contains(&resolution) {
            return Err(PreviewError::InvalidInput(format!(
                "{resolution} is not a supported preview size"
            )));
        }
        self.with_camera(camera, |state| {
            state.resolution = Some(resolution);
            Ok(())
        })
    }

    fn request_one_frame(
        &self,
        camera: &CameraHandle,
        on_frame: FrameCallback,
    ) -> Result<(), PreviewError> {
        let resolution = self.with_camera(camera, |state| {
            if !state.streaming {
                return Err(PreviewError::CaptureUnavailable("preview is not running".into()));
            }
            state.resolution.ok_or_else(|| {
                PreviewError::CaptureUnavailable("no preview size configured".into())
            })
        })?;

        let scene = *lock(&self.scene);
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let posted = self.thread.post(Box::new(move || {
            let data = render_nv21(scene, resolution, sequence);
            on_frame(RawFrame::new(data, PixelFormat::Nv21, resolution, sequence));
        }));
        if posted {
            Ok(())
        } else {
            Err(PreviewError::CaptureUnavailable("capture thread stopped".into()))
        }
    }

    fn start_streaming(&self, camera: &CameraHandle) -> Result<(), PreviewError> {
        self.with_camera(camera, |state| {
            if state.resolution.is_none() {
                return Err(PreviewError::CaptureUnavailable(
                    "no preview size configured".into(),
                ));
            }
            state.streaming = true;
            Ok(())
        })
    }

    fn stop_streaming(&self, camera: &CameraHandle) {
        let _ = self.with_camera(camera, |state| {
            state.streaming = false;
            Ok(())
        });
    }

    fn release(&self, camera: &CameraHandle) {
        lock(&self.cameras).remove(&camera.id());
    }
}
