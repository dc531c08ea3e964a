//! Bake pipeline: plan a tree, capture every entry, report
//!
//! The pipeline drives strategies one entry at a time against a shared
//! session. A node that cannot be captured is reported and skipped; only
//! errors that make every later capture pointless (missing document, engine
//! that will not start, closed session) abort the bake.

use crate::asset::AssetAllocator;
use crate::rules::{AuditWriter, BakePlan, EntryMetadata, NodeTree, RuleEngine, Technique};
use crate::session::RenderSession;
use crate::strategy::{CaptureRequest, ManualParams, StrategyContext, Variant};
use crate::{Result, Viewport};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "bake-report.json";

/// Variants captured for one plan entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BakedNode {
    pub node_id: String,
    pub technique: Technique,
    pub variants: Vec<Variant>,
    pub metadata: EntryMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFailure {
    pub node_id: String,
    pub technique: Technique,
    pub error: String,
}

/// Outcome of a whole bake, written as `bake-report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BakeReport {
    pub document: PathBuf,
    pub viewport: Viewport,
    pub nodes: Vec<BakedNode>,
    pub failures: Vec<NodeFailure>,
}

impl BakeReport {
    pub fn variant_count(&self) -> usize {
        self.nodes.iter().map(|n| n.variants.len()).sum()
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_slice(&std::fs::read(path)?)?)
    }
}

pub struct Baker<'a> {
    session: &'a RenderSession,
    allocator: &'a dyn AssetAllocator,
    engine: RuleEngine,
    output_dir: PathBuf,
    overrides: HashMap<String, ManualParams>,
    dry_run: bool,
}

impl<'a> Baker<'a> {
    pub fn new(
        session: &'a RenderSession,
        allocator: &'a dyn AssetAllocator,
        engine: RuleEngine,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            session,
            allocator,
            engine,
            output_dir: output_dir.into(),
            overrides: HashMap::new(),
            dry_run: false,
        }
    }

    /// Operator filter/padding override for one node.
    pub fn with_manual(mut self, node_id: impl Into<String>, manual: ManualParams) -> Self {
        self.overrides.insert(node_id.into(), manual);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn plan(&self, tree: &NodeTree) -> BakePlan {
        self.engine.plan(tree)
    }

    /// Plan `tree`, write the audit files, then capture every entry.
    pub async fn bake(&self, document: &Path, tree: &NodeTree) -> Result<BakeReport> {
        let plan = self.plan(tree);
        let audit = AuditWriter::new(&self.output_dir).write(&plan)?;
        info!(
            "baking {} entries of {} (plan at {})",
            plan.entries.len(),
            document.display(),
            audit.plan.display()
        );

        let mut report = BakeReport {
            document: document.to_path_buf(),
            viewport: plan.viewport,
            nodes: Vec::new(),
            failures: Vec::new(),
        };

        for entry in &plan.entries {
            let mut request = CaptureRequest::new(&entry.node_id, document);
            if let Some(manual) = self.overrides.get(&entry.node_id) {
                request = request.with_manual(manual.clone());
            }
            let ctx = StrategyContext::new(self.session, self.allocator)
                .with_hints(entry.hints.clone())
                .with_adjustments(entry.adjustments.clone())
                .with_viewport(plan.viewport)
                .dry_run(self.dry_run);

            match entry.technique.strategy().run(&request, &ctx).await {
                Ok(variants) => report.nodes.push(BakedNode {
                    node_id: entry.node_id.clone(),
                    technique: entry.technique,
                    variants,
                    metadata: entry.metadata.clone(),
                }),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("skipping {} ({}): {}", entry.node_id, entry.technique.name(), e);
                    report.failures.push(NodeFailure {
                        node_id: entry.node_id.clone(),
                        technique: entry.technique,
                        error: e.to_string(),
                    });
                }
            }
        }

        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::write(self.output_dir.join(REPORT_FILE), serde_json::to_vec_pretty(&report)?)?;
        info!(
            "baked {} variants for {} nodes, {} failed",
            report.variant_count(),
            report.nodes.len(),
            report.failures.len()
        );
        Ok(report)
    }
}
