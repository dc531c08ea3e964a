//! Pixel clip boxes used for every capture

use serde::{Deserialize, Serialize};

/// An integer capture box in page coordinates.
///
/// A `Clip` obtained through [`Clip::normalize`] always has a non-negative
/// origin and is at least 1×1 pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Clip {
    /// Normalize an arbitrary floating-point box.
    ///
    /// Returns `None` when `width` or `height` is non-finite or not positive.
    /// Otherwise the origin is clamped to zero and the clip is shrunk to the
    /// whole pixels inside the source box, keeping at least one pixel.
    pub fn normalize(x: f64, y: f64, width: f64, height: f64) -> Option<Clip> {
        if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
            return None;
        }
        let (x, width) = clamp_axis(x, width);
        let (y, height) = clamp_axis(y, height);
        Some(Clip { x, y, width, height })
    }

    /// Grow a box by `padding` on every side, then normalize.
    pub fn padded(x: f64, y: f64, width: f64, height: f64, padding: f64) -> Option<Clip> {
        let pad = if padding.is_finite() { padding.max(0.0) } else { 0.0 };
        Clip::normalize(x - pad, y - pad, width + pad * 2.0, height + pad * 2.0)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

fn clamp_axis(origin: f64, extent: f64) -> (u32, u32) {
    let origin = if origin.is_finite() { origin } else { 0.0 };
    // Whole pixels only: the clip never reaches past either edge of the source.
    let start = origin.max(0.0).ceil();
    let end = (origin + extent).floor();
    let (start, end) = if end - start >= 1.0 {
        (start, end)
    } else {
        // Sub-pixel source: one pixel ending at the source's far edge.
        let end = end.max(1.0);
        (end - 1.0, end)
    };
    let start = start.min(u32::MAX as f64) as u32;
    let size = (end - start as f64).clamp(1.0, u32::MAX as f64) as u32;
    (start, size)
}
