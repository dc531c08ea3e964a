//! Rendering-engine drivers
//!
//! A driver owns one live page and performs the primitive operations the
//! render session needs. Drivers are synchronous and are only ever touched by
//! the page worker thread (see [`crate::page`]), so they need not be `Send`.

use crate::clip::Clip;
use crate::mutation::MutationRequest;
use crate::{Result, Viewport};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "cdp")]
pub mod cdp;

pub mod recording;

pub use recording::{DriverEvent, RecordingDriver, SceneNode};

/// Core trait for page drivers
pub trait PageDriver {
    /// Navigate to `url` and return once the document has been parsed.
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Resize the page viewport.
    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()>;

    /// Perform a render mutation and return its JSON reply.
    fn mutate(&mut self, request: &MutationRequest) -> Result<serde_json::Value>;

    /// Evaluate an arbitrary expression in the page.
    fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value>;

    /// Capture `clip` as PNG with a transparent background, including content
    /// outside the current viewport.
    fn capture(&mut self, clip: &Clip) -> Result<Vec<u8>>;

    /// Close the page, then the engine.
    fn close(&mut self) -> Result<()>;
}

/// Factory invoked on the page worker thread when the session first needs a page.
pub type DriverLauncher = Arc<dyn Fn() -> Result<Box<dyn PageDriver>> + Send + Sync>;

/// Wrap a closure as a [`DriverLauncher`].
pub fn launcher<F>(f: F) -> DriverLauncher
where
    F: Fn() -> Result<Box<dyn PageDriver>> + Send + Sync + 'static,
{
    Arc::new(f)
}
