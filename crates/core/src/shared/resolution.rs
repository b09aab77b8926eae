use std::fmt;
use std::str::FromStr;

use crate::shared::error::PreviewError;

/// A capture size supported by the camera hardware. Both sides are positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Result<Self, PreviewError> {
        if width == 0 || height == 0 {
            return Err(PreviewError::InvalidInput(format!(
                "resolution must be positive, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = parse_dimensions(s)?;
        Resolution::new(w, h)
    }
}

/// The drawable area measured on a layout pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Viewport {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = parse_dimensions(s)?;
        Ok(Viewport::new(w, h))
    }
}

/// Parses `"<width>x<height>"`.
fn parse_dimensions(s: &str) -> Result<(u32, u32), PreviewError> {
    let invalid = || PreviewError::InvalidInput(format!("expected WIDTHxHEIGHT, got '{s}'"));
    let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let w = w.trim().parse::<u32>().map_err(|_| invalid())?;
    let h = h.trim().parse::<u32>().map_err(|_| invalid())?;
    Ok((w, h))
}
