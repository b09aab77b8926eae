use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::detection::domain::detection_result::DetectionResult;
use crate::pipeline::detection_listener::DetectionListener;
use crate::shared::geometry::Point;
use crate::shared::resolution::Viewport;
use crate::shared::sync::lock;

/// How eye markers are painted. Passed explicitly to every render step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub eye_color: [u8; 3],
    pub eye_radius: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            eye_color: [255, 0, 0],
            eye_radius: 10.0,
        }
    }
}

/// A filled circle to paint over the preview, in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeMarker {
    pub center: Point,
    pub radius: f32,
    pub color: [u8; 3],
}

/// Maps every detected eye from frame space into the viewport.
///
/// The preview is scaled to fill the viewport, so each axis scales
/// independently.
pub fn eye_markers(
    result: &DetectionResult,
    viewport: Viewport,
    style: &OverlayStyle,
) -> Vec<EyeMarker> {
    let frame = result.resolution();
    let sx = viewport.width as f32 / frame.width() as f32;
    let sy = viewport.height as f32 / frame.height() as f32;
    let marker = |p: Point| EyeMarker {
        center: Point::new(p.x * sx, p.y * sy),
        radius: style.eye_radius,
        color: style.eye_color,
    };

    result
        .faces()
        .iter()
        .flat_map(|face| [marker(face.left_eye()), marker(face.right_eye())])
        .collect()
}

/// Redraw hook supplied by the display host.
pub type RedrawRequest = Box<dyn Fn() + Send + Sync>;

/// Listener that keeps the markers for the latest detection result and asks
/// the host to redraw whenever results arrive.
pub struct EyeOverlay {
    style: OverlayStyle,
    viewport: Mutex<Viewport>,
    markers: Mutex<Vec<EyeMarker>>,
    request_redraw: RedrawRequest,
}

impl EyeOverlay {
    pub fn new(style: OverlayStyle, viewport: Viewport, request_redraw: RedrawRequest) -> Self {
        Self {
            style,
            viewport: Mutex::new(viewport),
            markers: Mutex::new(Vec::new()),
            request_redraw,
        }
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        *lock(&self.viewport) = viewport;
    }

    pub fn markers(&self) -> Vec<EyeMarker> {
        lock(&self.markers).clone()
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }
}

impl DetectionListener for EyeOverlay {
    fn on_detection(&self, result: &DetectionResult) {
        let viewport = *lock(&self.viewport);
        let markers = eye_markers(result, viewport, &self.style);
        if markers.is_empty() {
            log::debug!("No faces, clearing overlay");
        } else {
            log::info!("New faces, redrawing");
        }
        *lock(&self.markers) = markers;
        (self.request_redraw)();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use approx::assert_relative_eq;

    use super::*;
    use crate::detection::domain::detection_result::DetectedFace;
    use crate::shared::resolution::Resolution;

    fn result_with_face() -> DetectionResult {
        let face = DetectedFace::new(Point::new(100.0, 50.0), Point::new(200.0, 60.0), 0.9);
        DetectionResult::new(vec![face], Resolution::new(400, 200).unwrap(), 7)
    }

    #[test]
    fn test_default_style_is_red() {
        let style = OverlayStyle::default();
        assert_eq!(style.eye_color, [255, 0, 0]);
        assert_relative_eq!(style.eye_radius, 10.0);
    }

    #[test]
    fn test_markers_scale_to_viewport() {
        let style = OverlayStyle::default();
        let markers = eye_markers(&result_with_face(), Viewport::new(800, 600), &style);

        assert_eq!(markers.len(), 2);
        assert_relative_eq!(markers[0].center.x, 200.0);
        assert_relative_eq!(markers[0].center.y, 150.0);
        assert_relative_eq!(markers[1].center.x, 400.0);
        assert_relative_eq!(markers[1].center.y, 180.0);
        assert_eq!(markers[0].color, style.eye_color);
    }

    #[test]
    fn test_empty_result_has_no_markers() {
        let empty = DetectionResult::new(Vec::new(), Resolution::new(400, 200).unwrap(), 0);
        assert!(eye_markers(&empty, Viewport::new(400, 200), &OverlayStyle::default()).is_empty());
    }

    #[test]
    fn test_overlay_requests_redraw_on_each_result() {
        let redraws = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&redraws);
        let style = OverlayStyle {
            eye_color: [0, 255, 0],
            eye_radius: 4.0,
        };
        let overlay = EyeOverlay::new(
            style,
            Viewport::new(400, 200),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        overlay.on_detection(&result_with_face());
        assert_eq!(redraws.load(Ordering::SeqCst), 1);
        let markers = overlay.markers();
        assert_eq!(markers.len(), 2);
        assert_relative_eq!(markers[0].radius, 4.0);

        let empty = DetectionResult::new(Vec::new(), Resolution::new(400, 200).unwrap(), 8);
        overlay.on_detection(&empty);
        assert_eq!(redraws.load(Ordering::SeqCst), 2);
        assert!(overlay.markers().is_empty());
    }

    #[test]
    fn test_style_deserializes_with_defaults() {
        let style: OverlayStyle = serde_json::from_str(r#"{"eye_radius": 3.5}"#).unwrap();
        assert_eq!(style.eye_color, [255, 0, 0]);
        assert_relative_eq!(style.eye_radius, 3.5);
    }
}
