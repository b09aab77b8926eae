use crate::shared::constants::ASPECT_TOLERANCE;
use crate::shared::error::PreviewError;
use crate::shared::resolution::{Resolution, Viewport};

/// Picks the camera resolution that best fits a viewport.
///
/// Prefers sizes whose aspect ratio is within `aspect_tolerance` of the
/// viewport's, closest in height. When the camera offers no such size the
/// ratio constraint is dropped and the closest height overall wins. Ties
/// go to the first candidate in the supplied order.
#[derive(Clone, Copy, Debug)]
pub struct PreviewSizeSelector {
    aspect_tolerance: f64,
}

impl PreviewSizeSelector {
    pub fn new(aspect_tolerance: f64) -> Self {
        Self { aspect_tolerance }
    }

    pub fn select(
        &self,
        supported: &[Resolution],
        viewport: Viewport,
    ) -> Result<Resolution, PreviewError> {
        if supported.is_empty() {
            return Err(PreviewError::InvalidInput(
                "no supported preview sizes to choose from".into(),
            ));
        }

        let target_ratio = viewport.aspect_ratio();
        let target_height = viewport.height;

        let aspect_matched = closest_height(
            supported
                .iter()
                .filter(|size| (size.aspect_ratio() - target_ratio).abs() <= self.aspect_tolerance),
            target_height,
        );

        match aspect_matched {
            Some(size) => Ok(size),
            None => {
                log::debug!(
                    "No preview size within {} of aspect {target_ratio:.3}, matching height only",
                    self.aspect_tolerance
                );
                closest_height(supported.iter(), target_height).ok_or_else(|| {
                    PreviewError::InvalidInput("no supported preview sizes to choose from".into())
                })
            }
        }
    }
}

impl Default for PreviewSizeSelector {
    fn default() -> Self {
        Self::new(ASPECT_TOLERANCE)
    }
}

/// Convenience wrapper using the default aspect tolerance.
pub fn select_optimal_size(
    supported: &[Resolution],
    viewport: Viewport,
) -> Result<Resolution, PreviewError> {
    PreviewSizeSelector::default().select(supported, viewport)
}

/// First candidate minimising `|height - target|`.
fn closest_height<'a>(
    candidates: impl Iterator<Item = &'a Resolution>,
    target_height: u32,
) -> Option<Resolution> {
    let mut best: Option<(u32, Resolution)> = None;
    for size in candidates {
        let diff = size.height().abs_diff(target_height);
        if best.map_or(true, |(best_diff, _)| diff < best_diff) {
            best = Some((diff, *size));
        }
    }
    best.map(|(_, size)| size)
}
