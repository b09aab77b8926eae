//! The capture → transcode → detect → deliver cycle.
//!
//! Thread layout for one cycle:
//!
//! ```text
//! trigger (timer or caller) → capture thread → detection worker → display
//!      request_one_frame        on_frame          transcode        listener
//!                                                  detect
//! ```
//!
//! A [`CycleGuard`] keeps cycles from overlapping; triggers that arrive
//! while one is in flight are dropped.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use crate::capture::domain::capture_source::{
    CameraFacing, CameraHandle, CaptureSource, FrameCallback,
};
use crate::detection::domain::detection_result::DetectionResult;
use crate::detection::domain::face_detector::{DetectorSession, FaceDetectionBackend};
use crate::imaging::domain::frame_transcoder::FrameTranscoder;
use crate::pipeline::cycle_guard::{CycleGuard, CycleState};
use crate::pipeline::detection_listener::DetectionListener;
use crate::pipeline::display_dispatcher::DisplayHandle;
use crate::pipeline::periodic_scheduler::PeriodicScheduler;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::preview::domain::size_selector::PreviewSizeSelector;
use crate::shared::constants::{ASPECT_TOLERANCE, DEFAULT_FRAME_TIMEOUT, MAX_FACES};
use crate::shared::error::PreviewError;
use crate::shared::job_thread::JobThread;
use crate::shared::raw_frame::RawFrame;
use crate::shared::resolution::{Resolution, Viewport};
use crate::shared::settings::Settings;
use crate::shared::sync::lock;

/// Tunables fixed for the lifetime of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub max_faces: usize,
    pub aspect_tolerance: f64,
    /// How long a cycle may wait for its frame before a new trigger
    /// supersedes it. `None` waits forever.
    pub frame_timeout: Option<Duration>,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_faces: settings.max_faces,
            aspect_tolerance: settings.aspect_tolerance,
            frame_timeout: settings.frame_timeout(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_faces: MAX_FACES,
            aspect_tolerance: ASPECT_TOLERANCE,
            frame_timeout: Some(DEFAULT_FRAME_TIMEOUT),
        }
    }
}

/// What happened to a detection trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// A frame was requested for a new cycle.
    Started,
    /// Another cycle was in flight in the given state.
    Dropped(CycleState),
    /// The frame request itself failed; the pipeline is idle again.
    Failed(PreviewError),
}

struct ActiveCamera {
    handle: CameraHandle,
    resolutions: Vec<Resolution>,
    resolution: Option<Resolution>,
    previewing: bool,
}

struct Shared {
    capture: Arc<dyn CaptureSource>,
    transcoder: Box<dyn FrameTranscoder>,
    backend: Box<dyn FaceDetectionBackend>,
    selector: PreviewSizeSelector,
    config: PipelineConfig,
    display: DisplayHandle,
    guard: CycleGuard,
    /// One thread keeps cycles serialized, so results come out in the
    /// order their frames went in.
    worker: JobThread,
    camera: Mutex<Option<ActiveCamera>>,
    viewport: Mutex<Option<Viewport>>,
    session: Mutex<Option<Box<dyn DetectorSession>>>,
    listener: Mutex<Option<Arc<dyn DetectionListener>>>,
    logger: Mutex<Box<dyn PipelineLogger>>,
}

/// Periodically grabs one preview frame, finds faces in it and hands the
/// result to a listener on the display thread.
pub struct FrameDetectionPipeline {
    shared: Arc<Shared>,
    scheduler: Mutex<Option<PeriodicScheduler>>,
}

impl FrameDetectionPipeline {
    pub fn new(
        capture: Arc<dyn CaptureSource>,
        transcoder: Box<dyn FrameTranscoder>,
        backend: Box<dyn FaceDetectionBackend>,
        display: DisplayHandle,
        config: PipelineConfig,
    ) -> Result<Self, PreviewError> {
        let shared = Shared {
            capture,
            transcoder,
            backend,
            selector: PreviewSizeSelector::new(config.aspect_tolerance),
            config,
            display,
            guard: CycleGuard::new(),
            worker: JobThread::spawn("detection-worker")?,
            camera: Mutex::new(None),
            viewport: Mutex::new(None),
            session: Mutex::new(None),
            listener: Mutex::new(None),
            logger: Mutex::new(Box::new(NullPipelineLogger)),
        };
        Ok(Self {
            shared: Arc::new(shared),
            scheduler: Mutex::new(None),
        })
    }

    pub fn set_logger(&self, logger: Box<dyn PipelineLogger>) {
        *self.shared.logger() = logger;
    }

    pub fn set_listener(&self, listener: Arc<dyn DetectionListener>) {
        *lock(&self.shared.listener) = Some(listener);
    }

    pub fn clear_listener(&self) {
        *lock(&self.shared.listener) = None;
    }

    /// Opens the camera facing `facing` and queries its preview sizes.
    /// A previously opened camera is stopped and released first.
    pub fn open(&self, facing: CameraFacing) -> Result<(), PreviewError> {
        self.shared.open(facing)
    }

    /// Layout pass: picks the preview size for `viewport`, applies it to the
    /// camera and rebinds the detector session if the size changed.
    pub fn layout(&self, viewport: Viewport) -> Result<Resolution, PreviewError> {
        *lock(&self.shared.viewport) = Some(viewport);
        self.shared.apply_layout(viewport)
    }

    pub fn start_preview(&self) -> Result<(), PreviewError> {
        self.shared.start_preview()
    }

    pub fn stop_preview(&self) {
        self.shared.stop_preview()
    }

    /// Reopens on the other camera, re-applying the last viewport and
    /// restarting the preview if it was running.
    pub fn switch_camera(&self, facing: CameraFacing) -> Result<(), PreviewError> {
        let was_previewing = self.is_previewing();
        self.shared.open(facing)?;

        let viewport = *lock(&self.shared.viewport);
        if let Some(viewport) = viewport {
            self.shared.apply_layout(viewport)?;
        }
        if was_previewing {
            self.shared.start_preview()?;
        }
        Ok(())
    }

    /// One-shot trigger. Dropped if a cycle is already in flight.
    pub fn request_detection(&self) -> TriggerOutcome {
        self.shared.trigger()
    }

    /// Triggers a cycle every `interval` until [`stop_detection`] is called.
    ///
    /// [`stop_detection`]: FrameDetectionPipeline::stop_detection
    pub fn start_detection(&self, interval: Duration) -> Result<(), PreviewError> {
        self.stop_detection();
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let scheduler = PeriodicScheduler::start(interval, move || {
            if let Some(shared) = weak.upgrade() {
                shared.trigger();
            }
        })?;
        *lock(&self.scheduler) = Some(scheduler);
        log::info!("Face detection started every {interval:?}");
        Ok(())
    }

    /// Stops new cycles. A cycle already in flight still completes.
    pub fn stop_detection(&self) {
        let scheduler = lock(&self.scheduler).take();
        if let Some(mut scheduler) = scheduler {
            scheduler.stop();
            log::info!("Face detection every {:?} stopped", scheduler.interval());
            self.shared.logger().summary();
        }
    }

    pub fn is_detecting(&self) -> bool {
        lock(&self.scheduler)
            .as_ref()
            .is_some_and(PeriodicScheduler::is_running)
    }

    pub fn is_previewing(&self) -> bool {
        lock(&self.shared.camera)
            .as_ref()
            .is_some_and(|camera| camera.previewing)
    }

    pub fn state(&self) -> CycleState {
        self.shared.guard.state()
    }

    /// Blocks until no cycle is in flight. Returns `false` on timeout.
    ///
    /// A cycle in `Delivering` only finishes once the display loop runs, so
    /// do not call this from the display thread while a result is pending.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.shared.guard.wait_until_idle(timeout)
    }

    /// The preview size currently applied to the camera.
    pub fn preview_size(&self) -> Option<Resolution> {
        lock(&self.shared.camera)
            .as_ref()
            .and_then(|camera| camera.resolution)
    }

    pub fn camera(&self) -> Option<CameraHandle> {
        self.shared.camera_handle()
    }

    /// The size the current detector session is bound to.
    pub fn session_resolution(&self) -> Option<Resolution> {
        lock(&self.shared.session)
            .as_ref()
            .map(|session| session.resolution())
    }
}

impl Drop for FrameDetectionPipeline {
    fn drop(&mut self) {
        self.stop_detection();
        self.shared.release_camera();
    }
}

impl Shared {
    fn logger(&self) -> MutexGuard<'_, Box<dyn PipelineLogger>> {
        lock(&self.logger)
    }

    fn camera_handle(&self) -> Option<CameraHandle> {
        lock(&self.camera).as_ref().map(|camera| camera.handle)
    }

    fn open(&self, facing: CameraFacing) -> Result<(), PreviewError> {
        self.release_camera();

        let handle = self.capture.open(facing)?;
        let resolutions = match self.capture.supported_resolutions(&handle) {
            Ok(resolutions) => resolutions,
            Err(e) => {
                self.capture.release(&handle);
                return Err(e);
            }
        };
        log::info!(
            "Opened {facing} camera {} with {} preview sizes",
            handle.id(),
            resolutions.len()
        );
        *lock(&self.camera) = Some(ActiveCamera {
            handle,
            resolutions,
            resolution: None,
            previewing: false,
        });
        Ok(())
    }

    fn release_camera(&self) {
        if let Some(camera) = lock(&self.camera).take() {
            if camera.previewing {
                self.capture.stop_streaming(&camera.handle);
            }
            self.capture.release(&camera.handle);
            log::debug!("Released camera {}", camera.handle.id());
        }
    }

    fn apply_layout(&self, viewport: Viewport) -> Result<Resolution, PreviewError> {
        let mut guard = lock(&self.camera);
        let camera = guard
            .as_mut()
            .ok_or_else(|| PreviewError::CaptureUnavailable("no camera is open".into()))?;

        let size = self.selector.select(&camera.resolutions, viewport)?;
        if camera.resolution != Some(size) {
            // Preview size changes only take effect on a stopped stream.
            if camera.previewing {
                self.capture.stop_streaming(&camera.handle);
            }
            let applied = self.capture.set_resolution(&camera.handle, size);
            if camera.previewing {
                if let Err(e) = self.capture.start_streaming(&camera.handle) {
                    log::warn!("Preview did not restart after resize: {e}");
                    camera.previewing = false;
                }
            }
            applied?;
            camera.resolution = Some(size);
            log::info!("Preview size {size} for viewport {viewport}");
        }
        drop(guard);

        self.bind_session(size);
        Ok(size)
    }

    fn bind_session(&self, size: Resolution) {
        let mut session = lock(&self.session);
        if session.as_ref().map(|s| s.resolution()) == Some(size) {
            return;
        }
        *session = match self.backend.create_session(size, self.config.max_faces) {
            Ok(created) => {
                log::debug!(
                    "{} detector session bound to {size}, max {} faces",
                    self.backend.name(),
                    self.config.max_faces
                );
                Some(created)
            }
            Err(e) => {
                log::warn!("No face detection at {size}: {e}");
                None
            }
        };
    }

    fn start_preview(&self) -> Result<(), PreviewError> {
        let mut guard = lock(&self.camera);
        let Some(camera) = guard.as_mut() else {
            let err = PreviewError::CaptureUnavailable("no camera is open".into());
            log::warn!("Preview did not start: {err}");
            return Err(err);
        };
        if camera.previewing {
            return Ok(());
        }
        if let Err(e) = self.capture.start_streaming(&camera.handle) {
            log::warn!("Preview did not start: {e}");
            return Err(e);
        }
        camera.previewing = true;
        log::debug!("Preview started on camera {}", camera.handle.id());
        Ok(())
    }

    fn stop_preview(&self) {
        if let Some(camera) = lock(&self.camera).as_mut() {
            if camera.previewing {
                self.capture.stop_streaming(&camera.handle);
                camera.previewing = false;
                log::debug!("Preview stopped on camera {}", camera.handle.id());
            }
        }
    }

    fn trigger(self: &Arc<Self>) -> TriggerOutcome {
        let generation = match self.guard.try_begin(self.config.frame_timeout) {
            Ok(generation) => generation,
            Err(state) => {
                log::debug!("Detection trigger dropped, cycle is {state:?}");
                self.logger().metric("dropped_triggers", 1.0);
                return TriggerOutcome::Dropped(state);
            }
        };

        let Some(handle) = self.camera_handle() else {
            let err = PreviewError::CaptureUnavailable("no camera is open".into());
            self.abort(generation, &err);
            return TriggerOutcome::Failed(err);
        };

        let weak = Arc::downgrade(self);
        let on_frame: FrameCallback = Box::new(move |raw| {
            if let Some(shared) = weak.upgrade() {
                shared.on_frame(generation, raw);
            }
        });
        match self.capture.request_one_frame(&handle, on_frame) {
            Ok(()) => TriggerOutcome::Started,
            Err(e) => {
                self.abort(generation, &e);
                TriggerOutcome::Failed(e)
            }
        }
    }

    /// Runs on the capture source's callback thread.
    fn on_frame(self: &Arc<Self>, generation: u64, raw: RawFrame) {
        if !self.guard.advance(generation, CycleState::Transcoding) {
            log::debug!(
                "Discarding frame {} for superseded cycle {generation}",
                raw.sequence()
            );
            return;
        }

        let weak = Arc::downgrade(self);
        let posted = self.worker.post(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.process(generation, raw);
            }
        }));
        if !posted {
            let err = PreviewError::DetectorUnavailable(format!(
                "{} has stopped",
                self.worker.name()
            ));
            self.abort(generation, &err);
        }
    }

    /// Runs on the detection worker.
    fn process(self: &Arc<Self>, generation: u64, raw: RawFrame) {
        let started = Instant::now();
        let surface = match self.transcoder.transcode(&raw) {
            Ok(surface) => surface,
            Err(e) => return self.abort(generation, &e),
        };
        drop(raw);
        self.logger().timing("transcode", elapsed_ms(started));

        if !self.guard.advance(generation, CycleState::Detecting) {
            return;
        }
        let started = Instant::now();
        let detected = {
            let mut session = lock(&self.session);
            match session.as_mut() {
                Some(session) => session.detect(&surface).map(|mut faces| {
                    faces.truncate(session.max_faces());
                    DetectionResult::new(faces, session.resolution(), surface.sequence())
                }),
                None => Err(PreviewError::DetectorUnavailable(
                    "no detector session for the current preview size".into(),
                )),
            }
        };
        let result = match detected {
            Ok(result) => result,
            Err(e) => return self.abort(generation, &e),
        };
        {
            let mut logger = self.logger();
            logger.timing("detect", elapsed_ms(started));
            logger.metric("faces", result.len() as f64);
        }

        if !self.guard.advance(generation, CycleState::Delivering) {
            return;
        }
        let weak = Arc::downgrade(self);
        let posted = self.display.post(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.deliver(generation, result);
            }
        }));
        if !posted {
            log::warn!("Display loop is gone, dropping detection result");
            self.guard.finish(generation);
        }
    }

    /// Runs on the display thread.
    fn deliver(&self, generation: u64, result: DetectionResult) {
        let started = Instant::now();
        log::info!("Found {} faces", result.len());

        let listener = lock(&self.listener).clone();
        if let Some(listener) = listener {
            listener.on_detection(&result);
        }
        self.guard.finish(generation);

        let mut logger = self.logger();
        logger.timing("deliver", elapsed_ms(started));
        logger.cycle_completed(result.sequence());
    }

    fn abort(&self, generation: u64, err: &PreviewError) {
        if err.aborts_cycle() {
            log::warn!("Detection cycle {generation} skipped: {err}");
        } else {
            log::warn!("Detection cycle {generation} aborted: {err}");
        }
        self.logger().metric("aborted_cycles", 1.0);
        self.guard.finish(generation);
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread::{self, ThreadId};

    use super::*;
    use crate::capture::infrastructure::synthetic_capture_source::SyntheticCaptureSource;
    use crate::capture::infrastructure::synthetic_scene::{render_nv21, SyntheticScene};
    use crate::detection::infrastructure::eye_pair_detector::EyePairBackend;
    use crate::detection::infrastructure::unsupported_backend::UnsupportedBackend;
    use crate::imaging::infrastructure::direct_transcoder::DirectTranscoder;
    use crate::pipeline::display_dispatcher::DisplayLoop;
    use crate::shared::raw_frame::PixelFormat;

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum StreamEvent {
        Start,
        Stop,
        Resize(Resolution),
    }

    /// Capture source whose frames are delivered by the test.
    struct ManualCapture {
        resolutions: Vec<Resolution>,
        pending: Mutex<VecDeque<FrameCallback>>,
        requests: AtomicUsize,
        opened: Mutex<Vec<CameraFacing>>,
        applied: Mutex<Vec<Resolution>>,
        streaming: AtomicBool,
        refuse_streaming: AtomicBool,
        events: Mutex<Vec<StreamEvent>>,
    }

    impl ManualCapture {
        fn new(sizes: &[(u32, u32)]) -> Self {
            Self {
                resolutions: sizes
                    .iter()
                    .map(|&(w, h)| Resolution::new(w, h).unwrap())
                    .collect(),
                pending: Mutex::new(VecDeque::new()),
                requests: AtomicUsize::new(0),
                opened: Mutex::new(Vec::new()),
                applied: Mutex::new(Vec::new()),
                streaming: AtomicBool::new(false),
                refuse_streaming: AtomicBool::new(false),
                events: Mutex::new(Vec::new()),
            }
        }

        fn refusing_streaming(self) -> Self {
            self.refuse_streaming.store(true, Ordering::SeqCst);
            self
        }

        fn take_events(&self) -> Vec<StreamEvent> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }

        /// Hands `raw` to the oldest outstanding callback.
        fn deliver(&self, raw: RawFrame) {
            let callback = self.pending.lock().unwrap().pop_front();
            callback.expect("no outstanding frame request")(raw);
        }
    }

    impl CaptureSource for ManualCapture {
        fn open(&self, facing: CameraFacing) -> Result<CameraHandle, PreviewError> {
            let mut opened = self.opened.lock().unwrap();
            opened.push(facing);
            Ok(CameraHandle::new(opened.len() as u32, facing))
        }

        fn supported_resolutions(
            &self,
            _camera: &CameraHandle,
        ) -> Result<Vec<Resolution>, PreviewError> {
            Ok(self.resolutions.clone())
        }

        fn set_resolution(
            &self,
            _camera: &CameraHandle,
            resolution: Resolution,
        ) -> Result<(), PreviewError> {
            self.applied.lock().unwrap().push(resolution);
            self.events
                .lock()
                .unwrap()
                .push(StreamEvent::Resize(resolution));
            Ok(())
        }

        fn request_one_frame(
            &self,
            _camera: &CameraHandle,
            on_frame: FrameCallback,
        ) -> Result<(), PreviewError> {
            if !self.streaming.load(Ordering::SeqCst) {
                return Err(PreviewError::CaptureUnavailable("not streaming".into()));
            }
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.pending.lock().unwrap().push_back(on_frame);
            Ok(())
        }

        fn start_streaming(&self, _camera: &CameraHandle) -> Result<(), PreviewError> {
            self.events.lock().unwrap().push(StreamEvent::Start);
            if self.refuse_streaming.load(Ordering::SeqCst) {
                return Err(PreviewError::CaptureUnavailable("no display surface".into()));
            }
            self.streaming.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop_streaming(&self, _camera: &CameraHandle) {
            self.events.lock().unwrap().push(StreamEvent::Stop);
            self.streaming.store(false, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(ThreadId, usize)>>,
    }

    impl Recorder {
        fn count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl DetectionListener for Recorder {
        fn on_detection(&self, result: &DetectionResult) {
            self.calls
                .lock()
                .unwrap()
                .push((thread::current().id(), result.len()));
        }
    }

    struct CountingBackend {
        sessions: Arc<AtomicUsize>,
    }

    impl FaceDetectionBackend for CountingBackend {
        fn name(&self) -> &str {
            "counting"
        }

        fn create_session(
            &self,
            resolution: Resolution,
            max_faces: usize,
        ) -> Result<Box<dyn DetectorSession>, PreviewError> {
            self.sessions.fetch_add(1, Ordering::SeqCst);
            EyePairBackend.create_session(resolution, max_faces)
        }
    }

    fn build(
        capture: Arc<ManualCapture>,
        backend: Box<dyn FaceDetectionBackend>,
        display: &DisplayLoop,
        config: PipelineConfig,
    ) -> FrameDetectionPipeline {
        FrameDetectionPipeline::new(
            capture,
            Box::new(DirectTranscoder),
            backend,
            display.handle(),
            config,
        )
        .unwrap()
    }

    /// Open, lay out at 320x240 and start the preview.
    fn running(
        capture: &Arc<ManualCapture>,
        display: &DisplayLoop,
        config: PipelineConfig,
    ) -> (FrameDetectionPipeline, Arc<Recorder>) {
        let pipeline = build(Arc::clone(capture), Box::new(EyePairBackend), display, config);
        let recorder = Arc::new(Recorder::default());
        pipeline.set_listener(recorder.clone());
        pipeline.open(CameraFacing::Front).unwrap();
        pipeline.layout(Viewport::new(320, 240)).unwrap();
        pipeline.start_preview().unwrap();
        (pipeline, recorder)
    }

    fn face_frame(sequence: u64) -> RawFrame {
        let res = Resolution::new(320, 240).unwrap();
        RawFrame::new(
            render_nv21(SyntheticScene::Face, res, sequence),
            PixelFormat::Nv21,
            res,
            sequence,
        )
    }

    fn empty_frame() -> RawFrame {
        RawFrame::new(
            Vec::new(),
            PixelFormat::Nv21,
            Resolution::new(320, 240).unwrap(),
            0,
        )
    }

    #[test]
    fn test_rapid_triggers_start_at_most_one_more_cycle() {
        let capture = Arc::new(ManualCapture::new(&[(320, 240)]));
        let display = DisplayLoop::new();
        let (pipeline, recorder) = running(&capture, &display, PipelineConfig::default());

        assert_eq!(pipeline.request_detection(), TriggerOutcome::Started);
        for _ in 0..10 {
            assert_eq!(
                pipeline.request_detection(),
                TriggerOutcome::Dropped(CycleState::AwaitingFrame)
            );
        }
        assert_eq!(capture.requests(), 1);

        capture.deliver(face_frame(0));
        assert!(display.run_while_pending(WAIT, || pipeline.state().is_idle()));
        assert_eq!(recorder.count(), 1);

        assert_eq!(pipeline.request_detection(), TriggerOutcome::Started);
        assert_eq!(capture.requests(), 2);
    }

    #[test]
    fn test_empty_frame_returns_to_idle_without_listener() {
        let capture = Arc::new(ManualCapture::new(&[(320, 240)]));
        let display = DisplayLoop::new();
        let (pipeline, recorder) = running(&capture, &display, PipelineConfig::default());

        assert_eq!(pipeline.request_detection(), TriggerOutcome::Started);
        capture.deliver(empty_frame());

        assert!(pipeline.wait_until_idle(WAIT));
        assert_eq!(display.run_pending(), 0);
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn test_delivery_runs_on_display_context() {
        let capture = Arc::new(ManualCapture::new(&[(320, 240)]));
        let display = DisplayLoop::new();
        let constructed_on = thread::current().id();
        let (pipeline, recorder) = running(&capture, &display, PipelineConfig::default());

        pipeline.request_detection();
        // Deliver from a foreign thread, as a camera service would.
        let source = Arc::clone(&capture);
        thread::spawn(move || source.deliver(face_frame(3)))
            .join()
            .unwrap();

        assert!(display.run_while_pending(WAIT, || recorder.count() == 1));
        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls[0].0, constructed_on);
        assert_eq!(calls[0].0, display.context_id());
        assert_eq!(calls[0].1, 1);
    }

    #[test]
    fn test_stalled_cycle_is_superseded_and_its_frame_discarded() {
        let capture = Arc::new(ManualCapture::new(&[(320, 240)]));
        let display = DisplayLoop::new();
        let config = PipelineConfig {
            frame_timeout: Some(Duration::from_millis(20)),
            ..PipelineConfig::default()
        };
        let (pipeline, recorder) = running(&capture, &display, config);

        assert_eq!(pipeline.request_detection(), TriggerOutcome::Started);
        assert!(matches!(
            pipeline.request_detection(),
            TriggerOutcome::Dropped(_)
        ));
        thread::sleep(Duration::from_millis(40));
        assert_eq!(pipeline.request_detection(), TriggerOutcome::Started);
        assert_eq!(capture.requests(), 2);

        // The stale frame arrives late and must not run detection.
        capture.deliver(face_frame(0));
        assert_eq!(pipeline.state(), CycleState::AwaitingFrame);

        capture.deliver(face_frame(1));
        assert!(display.run_while_pending(WAIT, || pipeline.state().is_idle()));
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn test_unsupported_backend_skips_cycles() {
        let capture = Arc::new(ManualCapture::new(&[(320, 240)]));
        let display = DisplayLoop::new();
        let pipeline = build(
            Arc::clone(&capture),
            Box::new(UnsupportedBackend::new("no engine")),
            &display,
            PipelineConfig::default(),
        );
        let recorder = Arc::new(Recorder::default());
        pipeline.set_listener(recorder.clone());
        pipeline.open(CameraFacing::Back).unwrap();
        pipeline.layout(Viewport::new(320, 240)).unwrap();
        pipeline.start_preview().unwrap();
        assert!(pipeline.session_resolution().is_none());

        assert_eq!(pipeline.request_detection(), TriggerOutcome::Started);
        capture.deliver(face_frame(0));
        assert!(pipeline.wait_until_idle(WAIT));
        assert_eq!(display.run_pending(), 0);
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn test_layout_rebinds_session_only_when_size_changes() {
        let capture = Arc::new(ManualCapture::new(&[(640, 480), (1280, 720)]));
        let display = DisplayLoop::new();
        let sessions = Arc::new(AtomicUsize::new(0));
        let pipeline = build(
            Arc::clone(&capture),
            Box::new(CountingBackend {
                sessions: Arc::clone(&sessions),
            }),
            &display,
            PipelineConfig::default(),
        );
        pipeline.open(CameraFacing::Front).unwrap();

        let size = pipeline.layout(Viewport::new(640, 480)).unwrap();
        assert_eq!(size, Resolution::new(640, 480).unwrap());
        pipeline.layout(Viewport::new(640, 480)).unwrap();
        assert_eq!(sessions.load(Ordering::SeqCst), 1);
        assert_eq!(capture.applied.lock().unwrap().len(), 1);

        let size = pipeline.layout(Viewport::new(1280, 720)).unwrap();
        assert_eq!(size, Resolution::new(1280, 720).unwrap());
        assert_eq!(sessions.load(Ordering::SeqCst), 2);
        assert_eq!(pipeline.session_resolution(), Some(size));
        assert_eq!(pipeline.preview_size(), Some(size));
    }

    fn previewing_at_vga(
        capture: &Arc<ManualCapture>,
        display: &DisplayLoop,
    ) -> FrameDetectionPipeline {
        let pipeline = build(
            Arc::clone(capture),
            Box::new(EyePairBackend),
            display,
            PipelineConfig::default(),
        );
        pipeline.open(CameraFacing::Front).unwrap();
        pipeline.layout(Viewport::new(640, 480)).unwrap();
        pipeline.start_preview().unwrap();
        capture.take_events();
        pipeline
    }

    #[test]
    fn test_resize_while_previewing_restarts_stream_around_new_size() {
        let capture = Arc::new(ManualCapture::new(&[(640, 480), (1280, 720)]));
        let display = DisplayLoop::new();
        let pipeline = previewing_at_vga(&capture, &display);

        let size = pipeline.layout(Viewport::new(1280, 720)).unwrap();
        assert_eq!(size, Resolution::new(1280, 720).unwrap());
        assert_eq!(
            capture.take_events(),
            vec![StreamEvent::Stop, StreamEvent::Resize(size), StreamEvent::Start]
        );
        assert!(pipeline.is_previewing());
        assert_eq!(pipeline.session_resolution(), Some(size));

        // Same size again leaves the running stream alone.
        pipeline.layout(Viewport::new(1280, 720)).unwrap();
        assert!(capture.take_events().is_empty());
        assert_eq!(pipeline.request_detection(), TriggerOutcome::Started);
    }

    #[test]
    fn test_failed_restart_after_resize_clears_previewing() {
        let capture = Arc::new(ManualCapture::new(&[(640, 480), (1280, 720)]));
        let display = DisplayLoop::new();
        let pipeline = previewing_at_vga(&capture, &display);
        capture.refuse_streaming.store(true, Ordering::SeqCst);

        let size = pipeline.layout(Viewport::new(1280, 720)).unwrap();
        assert_eq!(
            capture.take_events(),
            vec![StreamEvent::Stop, StreamEvent::Resize(size), StreamEvent::Start]
        );
        assert!(!pipeline.is_previewing());
        assert_eq!(pipeline.preview_size(), Some(size));
        assert!(matches!(
            pipeline.request_detection(),
            TriggerOutcome::Failed(PreviewError::CaptureUnavailable(_))
        ));
        assert_eq!(pipeline.state(), CycleState::Idle);
    }

    #[test]
    fn test_layout_without_camera_is_capture_unavailable() {
        let capture = Arc::new(ManualCapture::new(&[(640, 480)]));
        let display = DisplayLoop::new();
        let pipeline = build(capture, Box::new(EyePairBackend), &display, PipelineConfig::default());
        let err = pipeline.layout(Viewport::new(640, 480)).unwrap_err();
        assert!(matches!(err, PreviewError::CaptureUnavailable(_)));
    }

    #[test]
    fn test_start_preview_failure_is_reported() {
        let capture = Arc::new(ManualCapture::new(&[(320, 240)]).refusing_streaming());
        let display = DisplayLoop::new();
        let pipeline = build(capture, Box::new(EyePairBackend), &display, PipelineConfig::default());

        let err = pipeline.start_preview().unwrap_err();
        assert!(matches!(err, PreviewError::CaptureUnavailable(_)));

        pipeline.open(CameraFacing::Front).unwrap();
        let err = pipeline.start_preview().unwrap_err();
        assert_eq!(
            err,
            PreviewError::CaptureUnavailable("no display surface".into())
        );
        assert!(!pipeline.is_previewing());
    }

    #[test]
    fn test_trigger_without_preview_fails_and_stays_idle() {
        let capture = Arc::new(ManualCapture::new(&[(320, 240)]));
        let display = DisplayLoop::new();
        let pipeline = build(
            Arc::clone(&capture),
            Box::new(EyePairBackend),
            &display,
            PipelineConfig::default(),
        );
        pipeline.open(CameraFacing::Front).unwrap();
        pipeline.layout(Viewport::new(320, 240)).unwrap();

        let outcome = pipeline.request_detection();
        assert!(matches!(
            outcome,
            TriggerOutcome::Failed(PreviewError::CaptureUnavailable(_))
        ));
        assert_eq!(pipeline.state(), CycleState::Idle);
        assert_eq!(capture.requests(), 0);
    }

    #[test]
    fn test_switch_camera_reapplies_layout_and_preview() {
        let capture = Arc::new(ManualCapture::new(&[(320, 240)]));
        let display = DisplayLoop::new();
        let (pipeline, _) = running(&capture, &display, PipelineConfig::default());

        pipeline.switch_camera(CameraFacing::Back).unwrap();

        assert_eq!(
            *capture.opened.lock().unwrap(),
            vec![CameraFacing::Front, CameraFacing::Back]
        );
        assert_eq!(pipeline.camera().map(|c| c.facing()), Some(CameraFacing::Back));
        assert_eq!(pipeline.preview_size(), Resolution::new(320, 240).ok());
        assert!(pipeline.is_previewing());
        assert_eq!(pipeline.request_detection(), TriggerOutcome::Started);
    }

    #[test]
    fn test_periodic_detection_over_synthetic_camera() {
        let capture = Arc::new(
            SyntheticCaptureSource::with_resolutions(
                SyntheticScene::Face,
                vec![Resolution::new(320, 240).unwrap()],
            )
            .unwrap(),
        );
        let display = DisplayLoop::new();
        let pipeline = FrameDetectionPipeline::new(
            capture,
            Box::new(DirectTranscoder),
            Box::new(EyePairBackend),
            display.handle(),
            PipelineConfig::default(),
        )
        .unwrap();
        let recorder = Arc::new(Recorder::default());
        pipeline.set_listener(recorder.clone());
        pipeline.open(CameraFacing::Front).unwrap();
        pipeline.layout(Viewport::new(640, 480)).unwrap();
        pipeline.start_preview().unwrap();

        pipeline.start_detection(Duration::from_millis(10)).unwrap();
        assert!(pipeline.is_detecting());
        assert!(display.run_while_pending(WAIT, || recorder.count() >= 2));
        pipeline.stop_detection();
        assert!(!pipeline.is_detecting());

        let calls = recorder.calls.lock().unwrap();
        assert!(calls.iter().all(|&(id, faces)| id == display.context_id() && faces == 1));
    }
}
