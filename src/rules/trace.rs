//! Rule traces and the audit files written next to the assets

use super::BakePlan;
use crate::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const PLAN_FILE: &str = "bake-plan.json";
pub const TRACE_FILE: &str = "rule-trace.json";

/// Names of the toggleable bake rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleName {
    OpacityDecoupled,
    LowAlphaContextCapture,
    BackgroundStackComposite,
    UnderlayFaintBorderSuppressed,
}

impl RuleName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleName::OpacityDecoupled => "opacity-decoupled",
            RuleName::LowAlphaContextCapture => "low-alpha-context-capture",
            RuleName::BackgroundStackComposite => "background-stack-composite",
            RuleName::UnderlayFaintBorderSuppressed => "underlay-faint-border-suppressed",
        }
    }
}

/// Record that a rule fired for a node, and on what evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTrace {
    pub rule: RuleName,
    pub node_id: String,
    pub trigger: String,
}

impl RuleTrace {
    pub fn new(rule: RuleName, node_id: &str, trigger: String) -> Self {
        debug!("rule {} fired for {}: {}", rule.as_str(), node_id, trigger);
        Self {
            rule,
            node_id: node_id.to_string(),
            trigger,
        }
    }
}

/// Paths of a written audit pair.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditFiles {
    pub plan: PathBuf,
    pub trace: PathBuf,
}

/// Writes `bake-plan.json` and `rule-trace.json` into an output directory.
pub struct AuditWriter {
    dir: PathBuf,
}

impl AuditWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn write(&self, plan: &BakePlan) -> Result<AuditFiles> {
        std::fs::create_dir_all(&self.dir)?;
        let files = AuditFiles {
            plan: self.dir.join(PLAN_FILE),
            trace: self.dir.join(TRACE_FILE),
        };
        std::fs::write(&files.plan, serde_json::to_vec_pretty(plan)?)?;
        std::fs::write(&files.trace, serde_json::to_vec_pretty(&plan.traces)?)?;
        Ok(files)
    }

    /// Read back a trace file.
    pub fn read_traces(path: &Path) -> Result<Vec<RuleTrace>> {
        Ok(serde_json::from_slice(&std::fs::read(path)?)?)
    }
}
