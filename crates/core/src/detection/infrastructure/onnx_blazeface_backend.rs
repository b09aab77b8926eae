//! BlazeFace face detector using ONNX Runtime via `ort`.
//!
//! The short-range model regresses a box and six keypoints per anchor. The
//! first two keypoints are the eyes, which is all a [`DetectedFace`] needs.

use std::path::{Path, PathBuf};

use ndarray::Array4;

use crate::detection::domain::detection_result::DetectedFace;
use crate::detection::domain::face_detector::{DetectorSession, FaceDetectionBackend};
use crate::shared::error::PreviewError;
use crate::shared::frame::Frame;
use crate::shared::geometry::Point;
use crate::shared::resolution::Resolution;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f32 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Box (4 values) plus six `(x, y)` keypoints per anchor.
const REGRESSOR_VALUES: usize = 16;

/// Keypoint indices of the subject's right and left eye.
const RIGHT_EYE: usize = 0;
const LEFT_EYE: usize = 1;

/// Creates BlazeFace sessions from an ONNX model on disk.
pub struct OnnxBlazefaceBackend {
    model_path: PathBuf,
    confidence: f32,
}

impl OnnxBlazefaceBackend {
    pub fn new(model_path: PathBuf, confidence: f32) -> Result<Self, PreviewError> {
        if !model_path.is_file() {
            return Err(PreviewError::DetectorUnavailable(format!(
                "model not found: {}",
                model_path.display()
            )));
        }
        if !(confidence > 0.0 && confidence <= 1.0) {
            return Err(PreviewError::InvalidInput(format!(
                "confidence must be in (0, 1], got {confidence}"
            )));
        }
        Ok(Self {
            model_path,
            confidence,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl FaceDetectionBackend for OnnxBlazefaceBackend {
    fn name(&self) -> &str {
        "blazeface"
    }

    fn create_session(
        &self,
        resolution: Resolution,
        max_faces: usize,
    ) -> Result<Box<dyn DetectorSession>, PreviewError> {
        if max_faces == 0 {
            return Err(PreviewError::DetectorUnavailable(
                "max_faces must be at least 1".into(),
            ));
        }
        let session = load_session(&self.model_path).map_err(|e| {
            PreviewError::DetectorUnavailable(format!("{}: {e}", self.model_path.display()))
        })?;
        Ok(Box::new(OnnxBlazefaceSession {
            session,
            resolution,
            max_faces,
            confidence: self.confidence,
            anchors: generate_anchors(),
        }))
    }
}

fn load_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let session = ort::session::Session::builder()?.commit_from_file(model_path)?;
    Ok(session)
}

/// One ONNX Runtime session bound to a preview size.
pub struct OnnxBlazefaceSession {
    session: ort::session::Session,
    resolution: Resolution,
    max_faces: usize,
    confidence: f32,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceSession {
    /// Runs the model, returning the flattened regressors and raw scores.
    fn infer(
        &mut self,
        input: Array4<f32>,
    ) -> Result<(Vec<f32>, Vec<f32>), Box<dyn std::error::Error>> {
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }
        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        Ok((
            regressors.iter().copied().collect(),
            scores.iter().copied().collect(),
        ))
    }
}

impl DetectorSession for OnnxBlazefaceSession {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn max_faces(&self) -> usize {
        self.max_faces
    }

    fn detect(&mut self, surface: &Frame) -> Result<Vec<DetectedFace>, PreviewError> {
        if (surface.width(), surface.height())
            != (self.resolution.width(), self.resolution.height())
        {
            return Err(PreviewError::DetectorUnavailable(format!(
                "session bound to {} cannot read a {}x{} surface",
                self.resolution,
                surface.width(),
                surface.height()
            )));
        }

        let input = preprocess(surface, INPUT_SIZE)?;
        let (regressors, scores) = self
            .infer(input)
            .map_err(|e| PreviewError::DetectorUnavailable(format!("BlazeFace inference: {e}")))?;

        let candidates = decode(
            &regressors,
            &scores,
            &self.anchors,
            self.resolution,
            self.confidence,
        );
        log::debug!("{} BlazeFace candidates above {}", candidates.len(), self.confidence);
        Ok(select_faces(candidates, NMS_IOU_THRESH, self.max_faces))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> Result<Array4<f32>, PreviewError> {
    let src = frame.as_ndarray()?;
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = Array4::<f32>::zeros((1, 3, s, s));
    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }
    Ok(tensor)
}

// ---------------------------------------------------------------------------
// Anchors (short-range model)
// ---------------------------------------------------------------------------

/// 16×16 grid with 2 anchors per cell, then 8×8 with 6.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }
    anchors
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
    face: DetectedFace,
}

/// Turns raw model output into candidates in frame pixel coordinates.
fn decode(
    regressors: &[f32],
    scores: &[f32],
    anchors: &[[f32; 2]],
    resolution: Resolution,
    confidence: f32,
) -> Vec<Candidate> {
    let fw = resolution.width() as f32;
    let fh = resolution.height() as f32;
    let scale = INPUT_SIZE as f32;

    scores
        .iter()
        .zip(anchors)
        .enumerate()
        .filter_map(|(i, (&raw_score, anchor))| {
            let score = sigmoid(raw_score);
            if score < confidence {
                return None;
            }
            let reg = regressors.get(i * REGRESSOR_VALUES..(i + 1) * REGRESSOR_VALUES)?;

            let cx = anchor[0] + reg[0] / scale;
            let cy = anchor[1] + reg[1] / scale;
            let w = reg[2] / scale;
            let h = reg[3] / scale;
            let keypoint = |k: usize| {
                Point::new(
                    (anchor[0] + reg[4 + 2 * k] / scale) * fw,
                    (anchor[1] + reg[5 + 2 * k] / scale) * fh,
                )
            };

            Some(Candidate {
                x1: ((cx - w / 2.0) * fw).max(0.0),
                y1: ((cy - h / 2.0) * fh).max(0.0),
                x2: ((cx + w / 2.0) * fw).min(fw),
                y2: ((cy + h / 2.0) * fh).min(fh),
                score,
                face: DetectedFace::new(keypoint(RIGHT_EYE), keypoint(LEFT_EYE), score),
            })
        })
        .collect()
}

/// Non-maximum suppression, then the best `max_faces` survivors.
fn select_faces(
    mut candidates: Vec<Candidate>,
    iou_thresh: f32,
    max_faces: usize,
) -> Vec<DetectedFace> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_faces {
            break;
        }
        if kept.iter().all(|k| bbox_iou(k, &candidate) <= iou_thresh) {
            kept.push(candidate);
        }
    }
    kept.into_iter().map(|c| c.face).collect()
}

fn bbox_iou(a: &Candidate, b: &Candidate) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
