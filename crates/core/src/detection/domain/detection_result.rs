use crate::shared::geometry::{Point, Rect};
use crate::shared::resolution::Resolution;

/// Face width relative to the distance between the eyes.
const FACE_WIDTH_PER_EYE_DISTANCE: f32 = 2.0;
const FACE_HEIGHT_PER_EYE_DISTANCE: f32 = 2.4;
/// Fraction of the face height above the eye line.
const EYE_LINE_FROM_TOP: f32 = 0.35;

/// One face found by a detector, in frame pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedFace {
    left_eye: Point,
    right_eye: Point,
    confidence: f32,
}

impl DetectedFace {
    /// Eyes are stored left-to-right in image space regardless of argument
    /// order.
    pub fn new(eye_a: Point, eye_b: Point, confidence: f32) -> Self {
        let (left_eye, right_eye) = if eye_a.x <= eye_b.x {
            (eye_a, eye_b)
        } else {
            (eye_b, eye_a)
        };
        Self {
            left_eye,
            right_eye,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn left_eye(&self) -> Point {
        self.left_eye
    }

    pub fn right_eye(&self) -> Point {
        self.right_eye
    }

    /// Point halfway between the eyes.
    pub fn mid_point(&self) -> Point {
        self.left_eye.midpoint(&self.right_eye)
    }

    pub fn eyes_distance(&self) -> f32 {
        self.left_eye.distance(&self.right_eye)
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Estimated face box derived from eye geometry.
    pub fn bounds(&self) -> Rect {
        let d = self.eyes_distance();
        let mid = self.mid_point();
        let width = d * FACE_WIDTH_PER_EYE_DISTANCE;
        let height = d * FACE_HEIGHT_PER_EYE_DISTANCE;
        Rect {
            x: mid.x - width / 2.0,
            y: mid.y - height * EYE_LINE_FROM_TOP,
            width,
            height,
        }
    }
}

/// Output of one detection pass. Never retained past delivery.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    faces: Vec<DetectedFace>,
    resolution: Resolution,
    sequence: u64,
}

impl DetectionResult {
    pub fn new(faces: Vec<DetectedFace>, resolution: Resolution, sequence: u64) -> Self {
        Self {
            faces,
            resolution,
            sequence,
        }
    }

    pub fn faces(&self) -> &[DetectedFace] {
        &self.faces
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Resolution of the frame the faces were found in.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Sequence number of the source frame.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}
