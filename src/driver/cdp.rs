//! Chrome DevTools Protocol driver (uses the `headless_chrome` crate)

use crate::clip::Clip;
use crate::driver::{launcher, DriverLauncher, PageDriver};
use crate::mutation::MutationRequest;
use crate::{script, Error, Result, SessionOptions, Viewport};
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::types::Method;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

// Minimal protocol messages. Declaring only the fields we send keeps the
// driver independent of the generated protocol structs' exact shape.

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetDeviceMetricsOverride {
    width: u32,
    height: u32,
    device_scale_factor: f64,
    mobile: bool,
}

impl Method for SetDeviceMetricsOverride {
    const NAME: &'static str = "Emulation.setDeviceMetricsOverride";
    type ReturnObject = EmptyReturn;
}

#[derive(Debug, Serialize)]
struct Rgba {
    r: u8,
    g: u8,
    b: u8,
    a: f64,
}

#[derive(Debug, Serialize)]
struct SetDefaultBackgroundColorOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<Rgba>,
}

impl Method for SetDefaultBackgroundColorOverride {
    const NAME: &'static str = "Emulation.setDefaultBackgroundColorOverride";
    type ReturnObject = EmptyReturn;
}

#[derive(Debug, Serialize)]
struct ClipRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    scale: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptureScreenshot {
    format: &'static str,
    clip: ClipRect,
    from_surface: bool,
    capture_beyond_viewport: bool,
}

impl Method for CaptureScreenshot {
    const NAME: &'static str = "Page.captureScreenshot";
    type ReturnObject = ScreenshotReturn;
}

#[derive(Debug, Deserialize)]
struct EmptyReturn {}

#[derive(Debug, Deserialize)]
struct ScreenshotReturn {
    data: String,
}

/// CDP-based page driver.
///
/// Launches a headless Chrome instance and manages a single tab for the whole
/// lifetime of the render session.
pub struct CdpDriver {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl CdpDriver {
    pub fn launch(options: &SessionOptions) -> Result<Self> {
        let vp = options.default_viewport;
        let launch_options = LaunchOptions::default_builder()
            .headless(options.headless)
            .window_size(Some((vp.width, vp.height)))
            // The session is long-lived; never let the browser idle out between captures.
            .idle_browser_timeout(Duration::from_secs(60 * 60 * 24))
            .build()
            .map_err(|e| Error::Initialization(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::Initialization(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::Initialization(format!("Failed to create tab: {}", e)))?;

        debug!("launched headless chrome (headless={})", options.headless);
        Ok(Self { browser: Some(browser), tab })
    }

    /// Launcher for [`crate::RenderSession::new`].
    pub fn launcher(options: &SessionOptions) -> DriverLauncher {
        let options = options.clone();
        launcher(move || Ok(Box::new(CdpDriver::launch(&options)?) as Box<dyn PageDriver>))
    }

    fn eval_json(&self, expression: &str) -> Result<serde_json::Value> {
        let wrapped = format!("JSON.stringify(({}))", expression);
        let remote = self
            .tab
            .evaluate(&wrapped, false)
            .map_err(|e| Error::Render(format!("Evaluation failed: {}", e)))?;

        match remote.value {
            Some(serde_json::Value::String(s)) => Ok(serde_json::from_str(&s)?),
            Some(other) => Ok(other),
            None => Ok(serde_json::Value::Null),
        }
    }
}

impl PageDriver for CdpDriver {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        // Tag the outgoing document so the poll below cannot mistake it for the new one.
        self.eval_json("(window.__rfbakeStale = true)")?;

        self.tab
            .navigate_to(url)
            .map_err(|e| Error::Navigation(format!("Navigation to {} failed: {}", url, e)))?;

        let started = Instant::now();
        let probe = format!("(!window.__rfbakeStale && {} !== 'loading')", script::READY_STATE_SCRIPT);
        loop {
            // Evaluation may fail transiently while the old context is torn down.
            if let Ok(serde_json::Value::Bool(true)) = self.eval_json(&probe) {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(Error::Timeout(timeout.as_millis() as u64));
            }
            std::thread::sleep(Duration::from_millis(25));
        }
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.tab.call_method(SetDeviceMetricsOverride {
            width: viewport.width,
            height: viewport.height,
            device_scale_factor: viewport.device_scale_factor,
            mobile: false,
        })?;
        Ok(())
    }

    fn mutate(&mut self, request: &MutationRequest) -> Result<serde_json::Value> {
        self.eval_json(&script::render(request))
    }

    fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value> {
        self.eval_json(expression)
    }

    fn capture(&mut self, clip: &Clip) -> Result<Vec<u8>> {
        self.tab.call_method(SetDefaultBackgroundColorOverride {
            color: Some(Rgba { r: 0, g: 0, b: 0, a: 0.0 }),
        })?;

        let shot = self.tab.call_method(CaptureScreenshot {
            format: "png",
            clip: ClipRect {
                x: clip.x as f64,
                y: clip.y as f64,
                width: clip.width as f64,
                height: clip.height as f64,
                scale: 1.0,
            },
            from_surface: true,
            capture_beyond_viewport: true,
        });

        // Restore the page background whatever the screenshot outcome.
        if let Err(e) = self.tab.call_method(SetDefaultBackgroundColorOverride { color: None }) {
            warn!("Failed to reset background override: {}", e);
        }

        let shot = shot.map_err(|e| Error::Render(format!("Screenshot failed: {}", e)))?;
        base64::engine::general_purpose::STANDARD
            .decode(shot.data)
            .map_err(|e| Error::Render(format!("Screenshot payload is not base64: {}", e)))
    }

    fn close(&mut self) -> Result<()> {
        if let Err(e) = self.tab.close(true) {
            warn!("Failed to close tab: {}", e);
        }
        // Dropping the browser terminates the child process.
        drop(self.browser.take());
        Ok(())
    }
}
