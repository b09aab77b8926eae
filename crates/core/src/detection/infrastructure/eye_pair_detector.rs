//! Eye pair matcher for the synthetic camera scene.
//!
//! Thresholds the luma plane at a fraction of its mean, labels connected
//! dark regions, keeps the roughly round eye-sized ones, and pairs blobs that
//! sit side by side with a brighter bridge between them.
//!
//! This is not a face detector: any two dark discs on a bright field pass.
//! It exists so the pipeline can run end to end against
//! [`SyntheticScene`](crate::capture::infrastructure::synthetic_scene::SyntheticScene)
//! frames without a model. Real detection goes through
//! [`OnnxBlazefaceBackend`](super::onnx_blazeface_backend::OnnxBlazefaceBackend).

use ndarray::{s, Array2, Axis};

use crate::detection::domain::detection_result::DetectedFace;
use crate::detection::domain::face_detector::{DetectorSession, FaceDetectionBackend};
use crate::shared::error::PreviewError;
use crate::shared::frame::Frame;
use crate::shared::geometry::Point;
use crate::shared::resolution::Resolution;

/// Pixels darker than `mean * DARK_RATIO` are eye candidates.
const DARK_RATIO: f32 = 0.45;
const MIN_EYE_AREA: usize = 12;
/// Largest eye blob as a fraction of the frame area.
const MAX_EYE_FRACTION: f32 = 0.01;
/// Blob area over bounding-box area; a disc fills ~0.785.
const MIN_FILL: f32 = 0.5;
const MAX_BLOB_ASPECT: f32 = 2.0;
/// Vertical offset over horizontal offset between paired eyes.
const MAX_TILT: f32 = 0.25;
/// Eye spacing bounds, in multiples of the larger blob extent.
const MIN_SPACING: f32 = 2.0;
const MAX_SPACING: f32 = 8.0;
const MIN_AREA_SIMILARITY: f32 = 0.4;
/// The bridge between the eyes must be this much brighter than the threshold.
const MIN_BRIDGE_CONTRAST: f32 = 1.5;
const MIN_CONFIDENCE: f32 = 0.3;

/// Backend producing [`EyePairSession`]s.
pub struct EyePairBackend;

impl FaceDetectionBackend for EyePairBackend {
    fn name(&self) -> &str {
        "eye-pair"
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
        Ok(Box::new(EyePairSession::new(resolution, max_faces)))
    }
}

pub struct EyePairSession {
    resolution: Resolution,
    max_faces: usize,
}

impl EyePairSession {
    pub fn new(resolution: Resolution, max_faces: usize) -> Self {
        Self {
            resolution,
            max_faces,
        }
    }
}

impl DetectorSession for EyePairSession {
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

        let luma = luma_plane(surface)?;
        let mean = luma.iter().map(|&v| v as f64).sum::<f64>() / luma.len().max(1) as f64;
        let threshold = (mean as f32 * DARK_RATIO) as u8;
        if threshold == 0 {
            return Ok(Vec::new());
        }

        let max_area = (self.resolution.pixel_count() as f32 * MAX_EYE_FRACTION) as usize;
        let eyes: Vec<Blob> = dark_blobs(&luma, threshold)
            .into_iter()
            .filter(|b| b.is_eye_like(max_area))
            .collect();
        log::debug!(
            "{} eye candidates below luma {threshold} (mean {mean:.1})",
            eyes.len()
        );

        let mut pairs = candidate_pairs(&luma, &eyes, threshold);
        pairs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut used = vec![false; eyes.len()];
        let mut faces = Vec::new();
        for pair in pairs {
            if faces.len() >= self.max_faces {
                break;
            }
            if used[pair.left] || used[pair.right] {
                continue;
            }
            used[pair.left] = true;
            used[pair.right] = true;
            faces.push(DetectedFace::new(
                eyes[pair.left].centroid(),
                eyes[pair.right].centroid(),
                pair.confidence,
            ));
        }
        Ok(faces)
    }
}

/// BT.601 luma, shape `(height, width)`.
fn luma_plane(surface: &Frame) -> Result<Array2<u8>, PreviewError> {
    let rgb = surface.as_ndarray()?;
    Ok(rgb.map_axis(Axis(2), |px| {
        let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
        ((77 * r + 150 * g + 29 * b + 128) >> 8) as u8
    }))
}

/// A 4-connected region of dark pixels.
#[derive(Debug)]
struct Blob {
    area: usize,
    min_x: usize,
    max_x: usize,
    min_y: usize,
    max_y: usize,
    sum_x: f64,
    sum_y: f64,
}

impl Blob {
    fn seed(x: usize, y: usize) -> Self {
        Self {
            area: 0,
            min_x: x,
            max_x: x,
            min_y: y,
            max_y: y,
            sum_x: 0.0,
            sum_y: 0.0,
        }
    }

    fn add(&mut self, x: usize, y: usize) {
        self.area += 1;
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
        self.sum_x += x as f64;
        self.sum_y += y as f64;
    }

    fn width(&self) -> usize {
        self.max_x - self.min_x + 1
    }

    fn height(&self) -> usize {
        self.max_y - self.min_y + 1
    }

    fn extent(&self) -> f32 {
        self.width().max(self.height()) as f32
    }

    /// Pixel-centre coordinates.
    fn centroid(&self) -> Point {
        let n = self.area as f64;
        Point::new((self.sum_x / n + 0.5) as f32, (self.sum_y / n + 0.5) as f32)
    }

    fn is_eye_like(&self, max_area: usize) -> bool {
        if self.area < MIN_EYE_AREA || self.area > max_area {
            return false;
        }
        let (w, h) = (self.width() as f32, self.height() as f32);
        let aspect = w / h;
        let fill = self.area as f32 / (w * h);
        fill >= MIN_FILL && (1.0 / MAX_BLOB_ASPECT..=MAX_BLOB_ASPECT).contains(&aspect)
    }
}

fn dark_blobs(luma: &Array2<u8>, threshold: u8) -> Vec<Blob> {
    let (h, w) = luma.dim();
    let mut visited = Array2::from_elem((h, w), false);
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut blobs = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if visited[[y, x]] || luma[[y, x]] >= threshold {
                continue;
            }
            visited[[y, x]] = true;
            stack.push((y, x));
            let mut blob = Blob::seed(x, y);

            while let Some((cy, cx)) = stack.pop() {
                blob.add(cx, cy);
                let neighbours = [
                    (cy.wrapping_sub(1), cx),
                    (cy + 1, cx),
                    (cy, cx.wrapping_sub(1)),
                    (cy, cx + 1),
                ];
                for (ny, nx) in neighbours {
                    if ny < h && nx < w && !visited[[ny, nx]] && luma[[ny, nx]] < threshold {
                        visited[[ny, nx]] = true;
                        stack.push((ny, nx));
                    }
                }
            }
            blobs.push(blob);
        }
    }
    blobs
}

struct EyePair {
    left: usize,
    right: usize,
    confidence: f32,
}

fn candidate_pairs(luma: &Array2<u8>, eyes: &[Blob], threshold: u8) -> Vec<EyePair> {
    let mut pairs = Vec::new();
    for i in 0..eyes.len() {
        for j in (i + 1)..eyes.len() {
            let (left, right) = if eyes[i].centroid().x <= eyes[j].centroid().x {
                (i, j)
            } else {
                (j, i)
            };
            if let Some(confidence) = score_pair(luma, &eyes[left], &eyes[right], threshold) {
                pairs.push(EyePair {
                    left,
                    right,
                    confidence,
                });
            }
        }
    }
    pairs
}

/// Returns the pair's confidence, or `None` when it cannot be a pair of eyes.
fn score_pair(luma: &Array2<u8>, left: &Blob, right: &Blob, threshold: u8) -> Option<f32> {
    let (a, b) = (left.centroid(), right.centroid());
    let dx = b.x - a.x;
    let dy = (b.y - a.y).abs();
    if dx <= 0.0 {
        return None;
    }
    let tilt = dy / dx;
    if tilt > MAX_TILT {
        return None;
    }

    let size = left.extent().max(right.extent());
    let spacing = a.distance(&b) / size;
    if !(MIN_SPACING..=MAX_SPACING).contains(&spacing) {
        return None;
    }

    let similarity = left.area.min(right.area) as f32 / left.area.max(right.area) as f32;
    if similarity < MIN_AREA_SIMILARITY {
        return None;
    }

    let bridge = bridge_mean(luma, left, right, &a.midpoint(&b), size)?;
    if bridge < threshold as f32 * MIN_BRIDGE_CONTRAST {
        return None;
    }
    let brightness = (bridge / (2.0 * threshold as f32)).min(1.0);

    let confidence = similarity.sqrt() * (1.0 - 0.5 * tilt / MAX_TILT) * brightness;
    (confidence >= MIN_CONFIDENCE).then_some(confidence)
}

/// Mean luma of the strip between the two blobs at eye height.
fn bridge_mean(luma: &Array2<u8>, left: &Blob, right: &Blob, mid: &Point, size: f32) -> Option<f32> {
    let (h, _) = luma.dim();
    let x0 = left.max_x + 1;
    let x1 = right.min_x;
    if x0 >= x1 {
        return None;
    }
    let half = (size / 4.0).max(1.0);
    let y0 = (mid.y - half).max(0.0) as usize;
    let y1 = ((mid.y + half) as usize).min(h);
    if y0 >= y1 {
        return None;
    }

    let strip = luma.slice(s![y0..y1, x0..x1]);
    let sum: f64 = strip.iter().map(|&v| v as f64).sum();
    Some((sum / strip.len() as f64) as f32)
}
