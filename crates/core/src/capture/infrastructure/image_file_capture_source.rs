use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use image::RgbImage;

use crate::capture::domain::capture_source::{
    CameraFacing, CameraHandle, CaptureSource, FrameCallback,
};
use crate::shared::error::PreviewError;
use crate::shared::job_thread::JobThread;
use crate::shared::nv21::rgb_to_nv21;
use crate::shared::raw_frame::{PixelFormat, RawFrame};
use crate::shared::resolution::Resolution;
use crate::shared::sync::lock;


#[derive(Default)]
struct CameraState {
    resolution: Option<Resolution>,
    frame: Option<Arc<Vec<u8>>>,
    streaming: bool,
}

/// Adapts a still image to the [`CaptureSource`] interface.
///
/// Every requested frame is the same picture, encoded as NV21 at the
/// selected size. The camera offers the image's native size and half of it.
pub struct ImageFileCaptureSource {
    image: RgbImage,
    resolutions: Vec<Resolution>,
    cameras: Mutex<HashMap<u32, CameraState>>,
    next_id: AtomicU32,
    sequence: AtomicU64,
    thread: JobThread,
}

impl ImageFileCaptureSource {
    pub fn open_path(path: &Path) -> Result<Self, PreviewError> {
        let image = image::open(path)
            .map_err(|e| PreviewError::CaptureUnavailable(format!("{}: {e}", path.display())))?
            .to_rgb8();
        Self::from_image(image)
    }

    pub fn from_image(image: RgbImage) -> Result<Self, PreviewError> {
        let native = Resolution::new(image.width(), image.height())?;
        let mut resolutions = vec![native];
        if let Ok(half) = Resolution::new(image.width() / 2, image.height() / 2) {
            resolutions.push(half);
        }
        let thread = JobThread::spawn("image-capture")?;
        Ok(Self {
            image,
            resolutions,
            cameras: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(0),
            sequence: AtomicU64::new(0),
            thread,
        })
    }

    pub fn native_resolution(&self) -> Resolution {
        self.resolutions[0]
    }

    fn encode(&self, resolution: Resolution) -> Vec<u8> {
        let (w, h) = (resolution.width(), resolution.height());
        if (w, h) == self.image.dimensions() {
            return rgb_to_nv21(self.image.as_raw(), w, h);
        }
        let scaled = image::imageops::resize(&self.image, w, h, image::imageops::FilterType::Triangle);
        rgb_to_nv21(scaled.as_raw(), w, h)
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

impl CaptureSource for ImageFileCaptureSource {
    fn open(&self, facing: CameraFacing) -> Result<CameraHandle, PreviewError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.cameras).insert(id, CameraState::default());
        log::debug!("Opened still-image {facing} camera {id}");
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
        let frame = Arc::new(self.encode(resolution));
        self.with_camera(camera, |state| {
            state.resolution = Some(resolution);
            state.frame = Some(frame);
            Ok(())
        })
    }

    fn request_one_frame(
        &self,
        camera: &CameraHandle,
        on_frame: FrameCallback,
    ) -> Result<(), PreviewError> {
        let (resolution, frame) = self.with_camera(camera, |state| {
            if !state.streaming {
                return Err(PreviewError::CaptureUnavailable("preview is not running".into()));
            }
            match (state.resolution, state.frame.clone()) {
                (Some(resolution), Some(frame)) => Ok((resolution, frame)),
                _ => Err(PreviewError::CaptureUnavailable(
                    "no preview size configured".into(),
                )),
            }
        })?;

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let posted = self.thread.post(Box::new(move || {
            let data = frame.as_ref().clone();
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
