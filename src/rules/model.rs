//! Analyzed node tree, as produced by the external analyzer
//!
//! Only the geometry and computed style the bake rules need are modelled.
//! Every field has a default so partial analyzer output still loads.

use crate::{Result, Viewport};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> f64 {
        if self.width > 0.0 && self.height > 0.0 {
            self.width * self.height
        } else {
            0.0
        }
    }

    /// Fraction of the viewport this box covers.
    pub fn viewport_coverage(&self, viewport: &Viewport) -> f64 {
        let vw = viewport.width as f64;
        let vh = viewport.height as f64;
        if vw <= 0.0 || vh <= 0.0 {
            return 0.0;
        }
        let w = (self.x + self.width).min(vw) - self.x.max(0.0);
        let h = (self.y + self.height).min(vh) - self.y.max(0.0);
        if w <= 0.0 || h <= 0.0 {
            return 0.0;
        }
        (w * h) / (vw * vh)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeStyle {
    pub opacity: f64,
    /// Alpha of the computed background color (0 when transparent)
    pub background_alpha: f64,
    pub background_image: bool,
    /// Widest border side, in CSS pixels
    pub border_width: f64,
    /// Alpha of the border color
    pub border_alpha: f64,
    pub box_shadow: Option<String>,
    pub filter: Option<String>,
    pub position: Option<String>,
}

impl Default for NodeStyle {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            background_alpha: 0.0,
            background_image: false,
            border_width: 0.0,
            border_alpha: 0.0,
            box_shadow: None,
            filter: None,
            position: None,
        }
    }
}

impl NodeStyle {
    pub fn paints_background(&self) -> bool {
        self.background_alpha > 0.0 || self.background_image
    }

    pub fn has_box_shadow(&self) -> bool {
        self.box_shadow.as_deref().is_some_and(|s| !s.trim().is_empty() && s.trim() != "none")
    }

    pub fn is_fixed(&self) -> bool {
        self.position.as_deref() == Some("fixed")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzedNode {
    pub id: String,
    pub tag: String,
    pub rect: Rect,
    pub style: NodeStyle,
    pub visible: bool,
    pub text: Option<String>,
    pub children: Vec<AnalyzedNode>,
}

impl Default for AnalyzedNode {
    fn default() -> Self {
        Self {
            id: String::new(),
            tag: "div".to_string(),
            rect: Rect::default(),
            style: NodeStyle::default(),
            visible: true,
            text: None,
            children: Vec::new(),
        }
    }
}

impl AnalyzedNode {
    pub fn new(id: &str, tag: &str, rect: Rect) -> Self {
        Self {
            id: id.to_string(),
            tag: tag.to_string(),
            rect,
            ..Default::default()
        }
    }

    pub fn with_style(mut self, style: NodeStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_children(mut self, children: Vec<AnalyzedNode>) -> Self {
        self.children = children;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_image_bearing(&self) -> bool {
        matches!(self.tag.to_ascii_lowercase().as_str(), "img" | "picture" | "video" | "canvas" | "svg")
            || self.style.background_image
    }

    /// This node followed by all of its descendants, level by level.
    pub fn descendants(&self) -> Vec<&AnalyzedNode> {
        let mut out = vec![self];
        let mut i = 0;
        while i < out.len() {
            let node = out[i];
            out.extend(node.children.iter());
            i += 1;
        }
        out
    }
}

/// Analyzer output for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeTree {
    pub document: Option<PathBuf>,
    pub viewport: Viewport,
    pub root: AnalyzedNode,
}

impl NodeTree {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
