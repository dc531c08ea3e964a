//! Render-mutation requests sent across the session boundary
//!
//! Strategies decide *which* mutation they need; a driver decides how to
//! perform it (the Chrome driver renders each request into a script, the
//! recording driver interprets it directly). Replies come back as JSON and are
//! parsed into [`Geometry`].

use crate::strategy::{CaptureAdjustments, ResolvedHints};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Attribute the analyzer stamps on every node it reports.
pub const NODE_ID_ATTR: &str = "data-bake-id";
/// Marks elements injected by a capture (style sheets, clones).
pub const ARTIFACT_ATTR: &str = "data-bake-artifact";
/// Marks the live target of an in-place capture.
pub const FOCUS_ATTR: &str = "data-bake-focus";
/// Holds the target's inline style while it is being mutated.
pub const SAVED_STYLE_ATTR: &str = "data-bake-saved-style";
/// Holds the target's own computed filter while color passes stack on it.
pub const BASE_FILTER_ATTR: &str = "data-bake-base-filter";

/// Attribute selector for a node id, with quotes and backslashes escaped.
pub fn node_selector(node_id: &str) -> String {
    let escaped = node_id.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[{}=\"{}\"]", NODE_ID_ATTR, escaped)
}

/// What an isolation mutation should do to the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolationSpec {
    pub node_id: String,
    pub selector: String,
    pub hide_children: bool,
    pub hide_own_text: bool,
    pub strip_text: bool,
    pub isolate: bool,
    pub full_opacity: bool,
    pub suppress_faint_border: bool,
    #[serde(default)]
    pub keep_children: Vec<String>,
}

impl IsolationSpec {
    pub fn new(node_id: &str, hints: &ResolvedHints, adjustments: &CaptureAdjustments) -> Self {
        Self {
            node_id: node_id.to_string(),
            selector: node_selector(node_id),
            hide_children: hints.hide_children,
            hide_own_text: hints.hide_own_text,
            strip_text: hints.strip_text,
            isolate: hints.isolate_node,
            full_opacity: adjustments.full_opacity,
            suppress_faint_border: adjustments.suppress_faint_border,
            keep_children: adjustments.keep_children.clone(),
        }
    }
}

/// One opaque mutation of the live page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MutationRequest {
    /// Remove every artifact, restore mutated styles, clear focus markers.
    Cleanup,
    /// Freeze animations and overlay a deep clone of the target.
    IsolateClone(IsolationSpec),
    /// Freeze animations and isolate the live target through scoped rules.
    IsolateInPlace(IsolationSpec),
    /// Apply a CSS filter to the focused in-place target.
    SetFilter { filter: String },
}

impl MutationRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            MutationRequest::Cleanup => "cleanup",
            MutationRequest::IsolateClone(_) => "isolate-clone",
            MutationRequest::IsolateInPlace(_) => "isolate-in-place",
            MutationRequest::SetFilter { .. } => "set-filter",
        }
    }
}

/// Rendered box of an isolated target, with the styles that paint outside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Geometry {
    pub found: bool,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub box_shadow: Option<String>,
    pub text_shadow: Option<String>,
    pub filter: Option<String>,
}

impl Geometry {
    /// Parse an isolation reply, mapping a missing target to `NotFound`.
    pub fn from_reply(node_id: &str, reply: serde_json::Value) -> Result<Self> {
        let geometry: Geometry = serde_json::from_value(reply)?;
        if !geometry.found {
            return Err(Error::NotFound(format!("no element matches {}", node_selector(node_id))));
        }
        Ok(geometry)
    }
}
