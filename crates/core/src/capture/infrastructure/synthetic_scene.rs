//! Procedural test scenes for the software camera.
//!
//! The face is a bright oval on a mid-grey background with two dark round
//! eyes and a thin dark mouth. It drifts a few pixels horizontally with the
//! frame sequence so consecutive frames differ.

use crate::shared::geometry::Point;
use crate::shared::nv21::gray_to_nv21;
use crate::shared::resolution::Resolution;

const BACKGROUND_LUMA: u8 = 110;
const FACE_LUMA: u8 = 190;
const EYE_LUMA: u8 = 30;
const MOUTH_LUMA: u8 = 90;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyntheticScene {
    Blank,
    Face,
}

/// Where the synthetic face's features land for a given frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceLayout {
    pub center: Point,
    pub radius_x: f32,
    pub radius_y: f32,
    pub left_eye: Point,
    pub right_eye: Point,
    pub eye_radius: f32,
}

impl FaceLayout {
    pub fn for_frame(width: u32, height: u32, sequence: u64) -> Self {
        let drift = ((sequence % 8) as f32 - 4.0) * (width as f32 / 320.0);
        let center = Point::new(width as f32 / 2.0 + drift, height as f32 / 2.0);
        let radius_x = height as f32 * 0.28;
        let radius_y = height as f32 * 0.36;
        let eye_y = center.y - radius_y * 0.25;
        let eye_dx = radius_x * 0.42;
        Self {
            center,
            radius_x,
            radius_y,
            left_eye: Point::new(center.x - eye_dx, eye_y),
            right_eye: Point::new(center.x + eye_dx, eye_y),
            eye_radius: radius_x * 0.12,
        }
    }

    pub fn eyes_distance(&self) -> f32 {
        self.left_eye.distance(&self.right_eye)
    }
}

/// Renders the scene's luma plane.
pub fn render_luma(scene: SyntheticScene, width: u32, height: u32, sequence: u64) -> Vec<u8> {
    let mut luma = vec![BACKGROUND_LUMA; width as usize * height as usize];
    if scene == SyntheticScene::Blank {
        return luma;
    }

    let face = FaceLayout::for_frame(width, height, sequence);
    let mouth_center = Point::new(face.center.x, face.center.y + face.radius_y * 0.45);
    let mouth_rx = face.radius_x * 0.4;
    let mouth_ry = face.radius_x * 0.06;

    for row in 0..height as usize {
        for col in 0..width as usize {
            let p = Point::new(col as f32 + 0.5, row as f32 + 0.5);
            let value = if p.distance(&face.left_eye) <= face.eye_radius
                || p.distance(&face.right_eye) <= face.eye_radius
            {
                EYE_LUMA
            } else if inside_ellipse(&p, &mouth_center, mouth_rx, mouth_ry) {
                MOUTH_LUMA
            } else if inside_ellipse(&p, &face.center, face.radius_x, face.radius_y) {
                FACE_LUMA
            } else {
                continue;
            };
            luma[row * width as usize + col] = value;
        }
    }
    luma
}

pub fn render_nv21(scene: SyntheticScene, resolution: Resolution, sequence: u64) -> Vec<u8> {
    let luma = render_luma(scene, resolution.width(), resolution.height(), sequence);
    gray_to_nv21(&luma, resolution.width(), resolution.height())
}

fn inside_ellipse(p: &Point, center: &Point, rx: f32, ry: f32) -> bool {
    let dx = (p.x - center.x) / rx;
    let dy = (p.y - center.y) / ry;
    dx * dx + dy * dy <= 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::raw_frame::PixelFormat;

    #[test]
    fn test_blank_scene_is_uniform() {
        let luma = render_luma(SyntheticScene::Blank, 64, 48, 0);
        assert!(luma.iter().all(|&v| v == BACKGROUND_LUMA));
    }

    #[test]
    fn test_face_scene_has_dark_eyes_on_bright_face() {
        let (w, h) = (320, 240);
        let luma = render_luma(SyntheticScene::Face, w, h, 0);
        let layout = FaceLayout::for_frame(w, h, 0);
        let at = |p: Point| luma[p.y as usize * w as usize + p.x as usize];

        assert_eq!(at(layout.left_eye), EYE_LUMA);
        assert_eq!(at(layout.right_eye), EYE_LUMA);
        assert_eq!(at(layout.left_eye.midpoint(&layout.right_eye)), FACE_LUMA);
        assert_eq!(luma[0], BACKGROUND_LUMA);
    }

    #[test]
    fn test_face_drifts_with_sequence() {
        let a = FaceLayout::for_frame(640, 480, 0);
        let b = FaceLayout::for_frame(640, 480, 3);
        assert!(b.center.x > a.center.x);
        assert_eq!(a.center.y, b.center.y);
    }

    #[test]
    fn test_nv21_length_matches_format() {
        let res = Resolution::new(176, 144).unwrap();
        let nv21 = render_nv21(SyntheticScene::Face, res, 0);
        assert_eq!(nv21.len(), PixelFormat::Nv21.frame_len(176, 144));
    }
}
