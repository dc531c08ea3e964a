//! Bake configuration
//!
//! Loaded from JSON, then overridden from the environment so a single rule
//! or timeout can be flipped for one run without editing files.

use crate::rules::{RuleName, RuleToggles};
use crate::{Error, Result, SessionOptions};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_NAV_TIMEOUT: &str = "RFBAKE_NAV_TIMEOUT_MS";
pub const ENV_SETTLE_TIMEOUT: &str = "RFBAKE_SETTLE_TIMEOUT_MS";

/// Environment switches that disable one rule each.
pub const RULE_ENV: [(&str, RuleName); 4] = [
    ("RFBAKE_DISABLE_OPACITY_DECOUPLED", RuleName::OpacityDecoupled),
    ("RFBAKE_DISABLE_LOW_ALPHA_CONTEXT", RuleName::LowAlphaContextCapture),
    ("RFBAKE_DISABLE_BACKGROUND_STACK", RuleName::BackgroundStackComposite),
    ("RFBAKE_DISABLE_FAINT_BORDER", RuleName::UnderlayFaintBorderSuppressed),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BakeConfig {
    pub session: SessionOptions,
    pub rules: RuleToggles,
    /// Root for assets and audit files
    pub output_dir: PathBuf,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            session: SessionOptions::default(),
            rules: RuleToggles::default(),
            output_dir: PathBuf::from("bake-out"),
        }
    }
}

impl BakeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable source.
    pub fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        for (key, rule) in RULE_ENV {
            if let Some(value) = var(key) {
                if truthy(&value) {
                    debug!("{} disables {}", key, rule.as_str());
                    self.rules.set(rule, false);
                }
            }
        }
        if let Some(ms) = millis(&var, ENV_NAV_TIMEOUT)? {
            self.session.navigation_timeout_ms = ms;
        }
        if let Some(ms) = millis(&var, ENV_SETTLE_TIMEOUT)? {
            self.session.settle_timeout_ms = ms;
        }
        Ok(())
    }
}

fn truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn millis(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    match var(key) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} must be a number of milliseconds, got {:?}", key, v))),
    }
}
