//! Deterministic in-memory driver
//!
//! `RecordingDriver` stands in for a browser: it knows a fixed scene of node
//! boxes, answers isolation requests from it, paints captures as solid fills
//! and records every call it receives. It also tracks how many isolation
//! artifacts are live, so callers can check that captures clean up after
//! themselves.

use crate::clip::Clip;
use crate::driver::{launcher, DriverLauncher, PageDriver};
use crate::mutation::MutationRequest;
use crate::{Error, Result, Viewport};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One node of the simulated page.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill: [u8; 4],
    pub box_shadow: Option<String>,
    pub filter: Option<String>,
}

impl SceneNode {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            fill: [255, 255, 255, 255],
            box_shadow: None,
            filter: None,
        }
    }

    pub fn fill(mut self, rgba: [u8; 4]) -> Self {
        self.fill = rgba;
        self
    }

    pub fn box_shadow(mut self, value: &str) -> Self {
        self.box_shadow = Some(value.to_string());
        self
    }
}

/// A call observed by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    Launch,
    Navigate(String),
    SetViewport(Viewport),
    Mutate(MutationRequest),
    Evaluate(String),
    Capture(Clip),
    Close,
}

#[derive(Default)]
struct Recording {
    scene: HashMap<String, SceneNode>,
    failing_captures: HashSet<String>,
    failing_mutations: HashSet<String>,
    fail_navigation: bool,
    events: Vec<DriverEvent>,
    artifacts: usize,
    isolated: Option<String>,
    focused: bool,
    filter: Option<String>,
}

/// Shared handle: clones observe and drive the same recording.
#[derive(Clone, Default)]
pub struct RecordingDriver {
    shared: Arc<Mutex<Recording>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(self, node_id: &str, node: SceneNode) -> Self {
        self.state().scene.insert(node_id.to_string(), node);
        self
    }

    /// Make every capture of `node_id` fail after isolation succeeded.
    pub fn fail_captures_for(self, node_id: &str) -> Self {
        self.state().failing_captures.insert(node_id.to_string());
        self
    }

    /// Make every mutation of the given kind (see [`MutationRequest::kind`]) fail.
    pub fn fail_mutation(self, kind: &str) -> Self {
        self.state().failing_mutations.insert(kind.to_string());
        self
    }

    pub fn fail_navigation(self, fail: bool) -> Self {
        self.state().fail_navigation = fail;
        self
    }

    /// Launcher that hands out this recording to the render session.
    pub fn launcher(&self) -> DriverLauncher {
        let handle = self.clone();
        launcher(move || {
            handle.state().events.push(DriverEvent::Launch);
            Ok(Box::new(handle.clone()) as Box<dyn PageDriver>)
        })
    }

    pub fn events(&self) -> Vec<DriverEvent> {
        self.state().events.clone()
    }

    pub fn mutations(&self) -> Vec<MutationRequest> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DriverEvent::Mutate(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&DriverEvent) -> bool) -> usize {
        self.state().events.iter().filter(|e| pred(e)).count()
    }

    /// Isolation artifacts currently present in the simulated page.
    pub fn artifacts(&self) -> usize {
        self.state().artifacts
    }

    fn state(&self) -> MutexGuard<'_, Recording> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn isolate(&self, node_id: &str, artifacts: usize, focus: bool) -> serde_json::Value {
        let mut state = self.state();
        let Some(node) = state.scene.get(node_id).cloned() else {
            return json!({ "found": false });
        };
        state.artifacts += if node.width > 0.0 && node.height > 0.0 { artifacts } else { 1 };
        state.isolated = Some(node_id.to_string());
        state.focused = focus;
        json!({
            "found": true,
            "x": node.x,
            "y": node.y,
            "width": node.width,
            "height": node.height,
            "boxShadow": node.box_shadow,
            "filter": node.filter,
        })
    }
}

fn encode_png(width: u32, height: u32, rgba: [u8; 4]) -> Result<Vec<u8>> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img).write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}

impl PageDriver for RecordingDriver {
    fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<()> {
        let mut state = self.state();
        state.events.push(DriverEvent::Navigate(url.to_string()));
        if state.fail_navigation {
            return Err(Error::Navigation(format!("refused to load {}", url)));
        }
        state.artifacts = 0;
        state.isolated = None;
        state.focused = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.state().events.push(DriverEvent::SetViewport(*viewport));
        Ok(())
    }

    fn mutate(&mut self, request: &MutationRequest) -> Result<serde_json::Value> {
        {
            let mut state = self.state();
            state.events.push(DriverEvent::Mutate(request.clone()));
            if state.failing_mutations.contains(request.kind()) {
                return Err(Error::Render(format!("simulated {} failure", request.kind())));
            }
        }
        let reply = match request {
            MutationRequest::Cleanup => {
                let mut state = self.state();
                let removed = state.artifacts;
                state.artifacts = 0;
                state.isolated = None;
                state.focused = false;
                state.filter = None;
                json!({ "removed": removed })
            }
            MutationRequest::IsolateClone(spec) => self.isolate(&spec.node_id, 2, false),
            MutationRequest::IsolateInPlace(spec) => self.isolate(&spec.node_id, 2, true),
            MutationRequest::SetFilter { filter } => {
                let mut state = self.state();
                if state.focused {
                    state.filter = Some(filter.clone());
                    json!({ "applied": true })
                } else {
                    json!({ "applied": false })
                }
            }
        };
        Ok(reply)
    }

    fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value> {
        self.state().events.push(DriverEvent::Evaluate(expression.to_string()));
        Ok(serde_json::Value::Null)
    }

    fn capture(&mut self, clip: &Clip) -> Result<Vec<u8>> {
        let fill = {
            let mut state = self.state();
            state.events.push(DriverEvent::Capture(*clip));
            match state.isolated.clone() {
                Some(id) if state.failing_captures.contains(&id) => {
                    return Err(Error::Render(format!("simulated capture failure for {}", id)));
                }
                Some(id) => state.scene.get(&id).map(|n| n.fill).unwrap_or([0, 0, 0, 0]),
                None => [0, 0, 0, 0],
            }
        };
        encode_png(clip.width, clip.height, fill)
    }

    fn close(&mut self) -> Result<()> {
        self.state().events.push(DriverEvent::Close);
        Ok(())
    }
}
