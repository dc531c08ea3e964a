//! Bake rules
//!
//! The rule engine walks the analyzer's node tree and picks a capture
//! technique per node. Every heuristic is a named rule that can be switched
//! off through [`RuleToggles`]; a disabled rule leaves the node on the path it
//! would have taken without it. Each firing is recorded as a [`RuleTrace`] so
//! a plan can be audited after the fact.

pub mod model;
pub mod trace;

pub use model::{AnalyzedNode, NodeStyle, NodeTree, Rect};
pub use trace::{AuditFiles, AuditWriter, RuleName, RuleTrace};

use crate::strategy::{CaptureAdjustments, CaptureHints, Strategy};
use crate::Viewport;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Highest background alpha still treated as a translucent underlay panel.
pub const LOW_ALPHA_MAX: f64 = 0.35;
pub const LOW_ALPHA_MIN_DEPTH: usize = 2;
/// Largest share of the viewport a low-alpha panel may cover.
pub const LOW_ALPHA_MAX_VIEWPORT_SHARE: f64 = 0.5;
pub const OPAQUE_OPACITY: f64 = 0.99;
pub const STACK_MAX_DEPTH: usize = 2;
/// Viewport share a child must cover to count as a background layer.
pub const STACK_COVERAGE: f64 = 0.95;
pub const FAINT_BORDER_MAX_WIDTH: f64 = 1.5;
pub const FAINT_BORDER_MAX_ALPHA: f64 = 0.2;

/// Per-rule switches. Everything is on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleToggles {
    pub opacity_decoupled: bool,
    pub low_alpha_context_capture: bool,
    pub background_stack_composite: bool,
    pub underlay_faint_border_suppressed: bool,
}

impl Default for RuleToggles {
    fn default() -> Self {
        Self {
            opacity_decoupled: true,
            low_alpha_context_capture: true,
            background_stack_composite: true,
            underlay_faint_border_suppressed: true,
        }
    }
}

impl RuleToggles {
    pub fn none() -> Self {
        Self {
            opacity_decoupled: false,
            low_alpha_context_capture: false,
            background_stack_composite: false,
            underlay_faint_border_suppressed: false,
        }
    }

    pub fn is_enabled(&self, rule: RuleName) -> bool {
        match rule {
            RuleName::OpacityDecoupled => self.opacity_decoupled,
            RuleName::LowAlphaContextCapture => self.low_alpha_context_capture,
            RuleName::BackgroundStackComposite => self.background_stack_composite,
            RuleName::UnderlayFaintBorderSuppressed => self.underlay_faint_border_suppressed,
        }
    }

    pub fn set(&mut self, rule: RuleName, enabled: bool) {
        match rule {
            RuleName::OpacityDecoupled => self.opacity_decoupled = enabled,
            RuleName::LowAlphaContextCapture => self.low_alpha_context_capture = enabled,
            RuleName::BackgroundStackComposite => self.background_stack_composite = enabled,
            RuleName::UnderlayFaintBorderSuppressed => self.underlay_faint_border_suppressed = enabled,
        }
    }
}

/// Capture technique chosen for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Technique {
    Clone,
    InPlace,
    /// One asset for a container and its stacked background layers
    Composite,
}

impl Technique {
    pub fn name(&self) -> &'static str {
        match self {
            Technique::Clone => "clone",
            Technique::InPlace => "in-place",
            Technique::Composite => "composite",
        }
    }

    /// Strategy that performs this technique.
    pub fn strategy(&self) -> Strategy {
        match self {
            Technique::Clone | Technique::Composite => Strategy::Clone,
            Technique::InPlace => Strategy::InPlace,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryMetadata {
    pub depth: usize,
    /// Real opacity, when the capture was taken at full opacity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    /// Nodes whose pixels this entry's asset already contains
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub absorbed: Vec<String>,
    pub rules: Vec<RuleName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub node_id: String,
    pub technique: Technique,
    pub hints: CaptureHints,
    pub adjustments: CaptureAdjustments,
    pub metadata: EntryMetadata,
}

impl PlanEntry {
    fn isolated_clone(node: &AnalyzedNode, depth: usize) -> Self {
        Self {
            node_id: node.id.clone(),
            technique: Technique::Clone,
            hints: CaptureHints::default(),
            adjustments: CaptureAdjustments::default(),
            metadata: EntryMetadata {
                depth,
                ..Default::default()
            },
        }
    }
}

/// Ordered capture plan for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BakePlan {
    pub document: Option<PathBuf>,
    pub viewport: Viewport,
    pub entries: Vec<PlanEntry>,
    /// Written to its own audit file
    #[serde(skip)]
    pub traces: Vec<RuleTrace>,
}

impl BakePlan {
    pub fn entry(&self, node_id: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.node_id == node_id)
    }

    pub fn fired(&self, node_id: &str) -> Vec<RuleName> {
        self.traces.iter().filter(|t| t.node_id == node_id).map(|t| t.rule).collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Scope {
    depth: usize,
    painted_ancestor: bool,
    viewport: Viewport,
}

/// Picks a technique for every capturable node of a tree.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    toggles: RuleToggles,
}

impl RuleEngine {
    pub fn new(toggles: RuleToggles) -> Self {
        Self { toggles }
    }

    pub fn toggles(&self) -> RuleToggles {
        self.toggles
    }

    /// Plan the whole tree, parents before children.
    pub fn plan(&self, tree: &NodeTree) -> BakePlan {
        let mut plan = BakePlan {
            document: tree.document.clone(),
            viewport: tree.viewport,
            ..Default::default()
        };
        let scope = Scope {
            depth: 0,
            painted_ancestor: false,
            viewport: tree.viewport,
        };
        self.visit(&tree.root, scope, &mut plan);
        log::debug!(
            "planned {} entries with {} rule firings",
            plan.entries.len(),
            plan.traces.len()
        );
        plan
    }

    fn visit(&self, node: &AnalyzedNode, scope: Scope, plan: &mut BakePlan) {
        if !node.visible || node.style.opacity <= 0.0 {
            return;
        }
        let child_scope = Scope {
            depth: scope.depth + 1,
            painted_ancestor: scope.painted_ancestor || node.style.paints_background(),
            ..scope
        };
        if node.rect.area() <= 0.0 {
            // Zero-size wrappers can still hold visible children.
            for child in &node.children {
                self.visit(child, child_scope, plan);
            }
            return;
        }

        let mut entry = PlanEntry::isolated_clone(node, scope.depth);
        let mut absorbed = HashSet::new();

        if let Some(members) = self.background_stack(node, &scope) {
            entry.technique = Technique::Composite;
            entry.hints.hide_children = Some(false);
            entry.adjustments.keep_children = members.iter().map(|m| m.id.clone()).collect();
            for member in &members {
                absorbed.extend(member.descendants().into_iter().map(|n| n.id.as_str()));
            }
            entry.metadata.absorbed = absorbed.iter().map(|id| id.to_string()).collect();
            entry.metadata.absorbed.sort();
            let images = members.iter().filter(|m| m.is_image_bearing()).count();
            self.fire(
                plan,
                &mut entry,
                RuleName::BackgroundStackComposite,
                format!("{} layers cover the viewport, {} image-bearing", members.len(), images),
            );
        } else {
            self.opacity_decoupled(node, plan, &mut entry);
            if self.low_alpha_context(node, &scope, plan, &mut entry) {
                self.faint_border(node, plan, &mut entry);
            }
        }
        plan.entries.push(entry);

        for child in &node.children {
            if !absorbed.contains(child.id.as_str()) {
                self.visit(child, child_scope, plan);
            }
        }
    }

    fn fire(&self, plan: &mut BakePlan, entry: &mut PlanEntry, rule: RuleName, trigger: String) {
        entry.metadata.rules.push(rule);
        plan.traces.push(RuleTrace::new(rule, &entry.node_id, trigger));
    }

    fn opacity_decoupled(&self, node: &AnalyzedNode, plan: &mut BakePlan, entry: &mut PlanEntry) {
        let opacity = node.style.opacity;
        if !self.toggles.opacity_decoupled || !node.is_leaf() || opacity >= 1.0 {
            return;
        }
        entry.adjustments.full_opacity = true;
        entry.metadata.opacity = Some(opacity);
        self.fire(plan, entry, RuleName::OpacityDecoupled, format!("leaf opacity {:.2}", opacity));
    }

    fn low_alpha_context(&self, node: &AnalyzedNode, scope: &Scope, plan: &mut BakePlan, entry: &mut PlanEntry) -> bool {
        if !self.toggles.low_alpha_context_capture {
            return false;
        }
        let style = &node.style;
        let share = node.rect.area() / scope.viewport.area().max(1.0);
        let qualifies = !node.is_leaf()
            && style.background_alpha > 0.0
            && style.background_alpha <= LOW_ALPHA_MAX
            && !style.background_image
            && !style.has_box_shadow()
            && !style.is_fixed()
            && scope.depth >= LOW_ALPHA_MIN_DEPTH
            && share <= LOW_ALPHA_MAX_VIEWPORT_SHARE
            && style.opacity >= OPAQUE_OPACITY
            && scope.painted_ancestor;
        if !qualifies {
            return false;
        }
        entry.technique = Technique::InPlace;
        // The painted ancestor must stay visible behind the translucent panel.
        entry.hints.isolate_node = Some(false);
        self.fire(
            plan,
            entry,
            RuleName::LowAlphaContextCapture,
            format!(
                "background alpha {:.2} at depth {} over a painted ancestor, {:.0}% of viewport",
                style.background_alpha,
                scope.depth,
                share * 100.0
            ),
        );
        true
    }

    fn faint_border(&self, node: &AnalyzedNode, plan: &mut BakePlan, entry: &mut PlanEntry) {
        let style = &node.style;
        if !self.toggles.underlay_faint_border_suppressed
            || style.border_width <= 0.0
            || style.border_width > FAINT_BORDER_MAX_WIDTH
            || style.border_alpha <= 0.0
            || style.border_alpha > FAINT_BORDER_MAX_ALPHA
        {
            return;
        }
        entry.adjustments.suppress_faint_border = true;
        self.fire(
            plan,
            entry,
            RuleName::UnderlayFaintBorderSuppressed,
            format!("border {}px at alpha {:.2}", style.border_width, style.border_alpha),
        );
    }

    /// Children that together form a full-viewport background stack.
    fn background_stack<'n>(&self, node: &'n AnalyzedNode, scope: &Scope) -> Option<Vec<&'n AnalyzedNode>> {
        if !self.toggles.background_stack_composite || scope.depth > STACK_MAX_DEPTH {
            return None;
        }
        let members: Vec<&AnalyzedNode> = node
            .children
            .iter()
            .filter(|c| c.visible && c.style.opacity > 0.0)
            .filter(|c| c.rect.viewport_coverage(&scope.viewport) >= STACK_COVERAGE)
            .collect();
        let has_image = members.iter().any(|m| m.is_image_bearing());
        (members.len() >= 2 && has_image).then_some(members)
    }
}
