//! Pixel-histogram auto levels
//!
//! The analyzer samples a captured PNG on a fixed stride, builds a 256-bucket
//! luma histogram over the non-transparent samples and derives a
//! contrast/brightness/saturation triple that the color-correction strategy
//! turns into a CSS `filter` string.

use crate::Result;
use image::GenericImageView;
use serde::{Deserialize, Serialize};

/// Every `SAMPLE_STRIDE`-th pixel (in row-major order) is sampled.
pub const SAMPLE_STRIDE: usize = 4;

pub const CONTRAST_RANGE: (f64, f64) = (1.05, 1.38);
pub const BRIGHTNESS_RANGE: (f64, f64) = (0.72, 1.03);
pub const SATURATION_RANGE: (f64, f64) = (1.02, 1.22);

/// Contrast used when the darkest tone gives nothing to lift.
pub const DEFAULT_CONTRAST: f64 = 1.08;
/// Contrast used for bright images that give nothing to lift.
pub const DEFAULT_CONTRAST_BRIGHT: f64 = 1.12;

pub const GAMMA_PRESET: &str = "brightness(1.03) contrast(1.12) saturate(1.06)";
pub const VIVID_PRESET: &str = "contrast(1.2) saturate(1.25) brightness(1.01)";

/// Luma statistics of the sampled, non-transparent pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LumaStats {
    pub min: u8,
    pub max: u8,
    pub avg: f64,
    pub samples: usize,
}

/// Auto-level coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoLevels {
    pub contrast: f64,
    pub brightness: f64,
    pub saturation: f64,
}

impl AutoLevels {
    pub fn neutral() -> Self {
        Self {
            contrast: DEFAULT_CONTRAST,
            brightness: 1.0,
            saturation: SATURATION_RANGE.0,
        }
    }

    /// Render as a CSS `filter` value.
    pub fn to_filter(&self) -> String {
        format!(
            "contrast({:.3}) brightness({:.3}) saturate({:.3})",
            self.contrast, self.brightness, self.saturation
        )
    }
}

#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// Histogram statistics over raw RGBA8 pixels. Returns `None` when no sampled
/// pixel is visible.
pub fn analyze_rgba(pixels: &[u8]) -> Option<LumaStats> {
    let mut buckets = [0usize; 256];
    let mut total = 0.0_f64;
    let mut samples = 0usize;

    for px in pixels.chunks_exact(4).step_by(SAMPLE_STRIDE) {
        if px[3] == 0 {
            continue;
        }
        let l = luma(px[0], px[1], px[2]);
        buckets[(l.round() as usize).min(255)] += 1;
        total += l;
        samples += 1;
    }

    if samples == 0 {
        return None;
    }
    let min = buckets.iter().position(|&n| n > 0)? as u8;
    let max = buckets.iter().rposition(|&n| n > 0)? as u8;
    Some(LumaStats {
        min,
        max,
        avg: total / samples as f64,
        samples,
    })
}

/// Decode an encoded image (PNG from the driver) and analyze it.
pub fn analyze_png(bytes: &[u8]) -> Result<Option<LumaStats>> {
    let img = image::load_from_memory(bytes)?;
    let (w, h) = img.dimensions();
    log::debug!("analyzing {}x{} capture", w, h);
    Ok(analyze_rgba(img.to_rgba8().as_raw()))
}

/// Derive auto-level coefficients from luma statistics.
pub fn auto_levels(stats: Option<&LumaStats>) -> AutoLevels {
    let Some(stats) = stats else {
        return AutoLevels::neutral();
    };
    let min = stats.min as f64;
    let avg = stats.avg;
    let range = stats.max.saturating_sub(stats.min) as f64;

    let contrast = if stats.min > 10 && range >= 8.0 {
        1.0 + min / 255.0
    } else if avg > 168.0 {
        DEFAULT_CONTRAST_BRIGHT
    } else {
        DEFAULT_CONTRAST
    };

    let brightness = if avg > 170.0 {
        1.0 - (avg - 170.0) / 255.0 * 0.9
    } else if avg < 80.0 {
        1.0 + (80.0 - avg) / 255.0 * 0.4
    } else {
        1.0
    };

    let contrast = contrast.clamp(CONTRAST_RANGE.0, CONTRAST_RANGE.1);
    let saturation = 1.02 + (1.0 - range / 255.0) * 0.12 + (contrast - 1.05) * 0.25;

    AutoLevels {
        contrast,
        brightness: brightness.clamp(BRIGHTNESS_RANGE.0, BRIGHTNESS_RANGE.1),
        saturation: saturation.clamp(SATURATION_RANGE.0, SATURATION_RANGE.1),
    }
}
