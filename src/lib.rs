//! RFox Bake Engine
//!
//! Converts a rendered document into composited raster assets plus layout
//! metadata, for reconstruction in a non-browser rendering target.
//!
//! # Features
//!
//! - **Render session**: one persistent page, serialized through FIFO-fair
//!   exclusive sections, reused across captures of the same document
//! - **Capture strategies**: clone, padding-expand, in-place and
//!   color-correction captures, plus a smart strategy that runs them all
//! - **Bake rules**: auditable, individually toggleable heuristics that pick
//!   a technique per node
//! - **CDP backend** (`cdp` feature): drives headless Chrome
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "cdp")]
//! # async fn run() -> rfbake::Result<()> {
//! use rfbake::{CaptureRequest, DirectoryAllocator, RenderSession, SessionOptions, Strategy, StrategyContext};
//!
//! let session = RenderSession::chrome(SessionOptions::default());
//! let allocator = DirectoryAllocator::new("out");
//! let request = CaptureRequest::new("hero", "page.html");
//! let ctx = StrategyContext::new(&session, &allocator);
//! let variants = Strategy::Smart.run(&request, &ctx).await?;
//! println!("{} candidates", variants.len());
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod asset;
pub mod clip;
pub mod color;
pub mod config;
pub mod driver;
pub mod exclusive;
pub mod mutation;
pub mod navigation;
pub mod page;
pub mod pipeline;
pub mod rules;
pub mod script;
pub mod session;
pub mod shadow;
pub mod strategy;

pub use asset::{AssetAllocator, AssetPath, DirectoryAllocator};
pub use clip::Clip;
pub use config::BakeConfig;
pub use exclusive::ExclusiveSection;
pub use page::PageHandle;
pub use pipeline::{BakeReport, Baker};
pub use rules::{RuleEngine, RuleToggles};
pub use session::{PageContext, RenderSession, SessionStats};
pub use strategy::{CaptureHints, CaptureRequest, ManualParams, Strategy, StrategyContext, Variant};

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            device_scale_factor: 1.0,
        }
    }
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }
}

/// Options for the render session
///
/// # Examples
///
/// ```
/// let opts = rfbake::SessionOptions::default();
/// assert!(opts.headless);
/// assert_eq!(opts.default_viewport.width, 1280);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Run the engine without a visible window
    pub headless: bool,
    /// Timeout for the "content parsed" navigation gate in milliseconds
    pub navigation_timeout_ms: u64,
    /// Budget for the best-effort full-load wait after a fresh navigation
    pub settle_timeout_ms: u64,
    /// Viewport applied when a call does not ask for one
    pub default_viewport: Viewport,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout_ms: 30000,
            settle_timeout_ms: 5000,
            default_viewport: Viewport::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = SessionOptions::default();
        assert_eq!(opts.default_viewport.width, 1280);
        assert_eq!(opts.default_viewport.height, 720);
        assert!(opts.headless);
    }

    #[test]
    fn test_viewport_equality_includes_scale() {
        let a = Viewport::new(800, 600);
        let b = Viewport { device_scale_factor: 2.0, ..a };
        assert_ne!(a, b);
        assert_eq!(a, Viewport::new(800, 600));
    }
}
